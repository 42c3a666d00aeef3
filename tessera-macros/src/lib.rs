// Procedural macros for the Tessera runtime

use proc_macro::TokenStream;

mod field;

/// Describes a record's fields to the body codec.
///
/// Every named field becomes addressable by its name in body item paths
/// and is flattened by name when the record is bound to an action. The
/// field types must implement `Field` themselves.
///
/// Field attributes:
///
/// - `#[field(rename = "Name")]` - wire name of the field
/// - `#[field(skip)]` - neither decoded nor encoded
///
/// Container attributes:
///
/// - `#[field(crate = "path")]` - where the codec lives, `::tessera` by default
///
/// ```ignore
/// #[derive(Default, Field)]
/// struct Filter {
///     #[field(rename = "Field")]
///     field: String,
///     dates: Dates,
/// }
/// ```
#[proc_macro_derive(Field, attributes(field))]
pub fn field_derive(input: TokenStream) -> TokenStream {
    field::field_derive_impl(input)
}
