use routekit::api::{HandlerSlot, OperationBuilder};

use crate::domain::binding::ImportSpec;

/// Declare the spreadsheet upload an operation accepts.
///
/// The handler receives it through [`SheetImport`](super::SheetImport) or
/// [`RawSheet`](super::RawSheet).
///
/// ```rust,ignore
/// OperationBuilder::post("/users/import")
///     .import(ImportSpec::of::<UserDto>().field("file"))
///     .handler(|SheetImport(users): SheetImport<UserDto>| async move { /* ... */ })
///     .json_response(200, "Imported")
///     .register(&mut routes)?;
/// ```
pub trait OperationBuilderImportExt: Sized {
    fn import(self, spec: ImportSpec) -> Self;
}

impl<H, R> OperationBuilderImportExt for OperationBuilder<H, R>
where
    H: HandlerSlot,
{
    fn import(self, spec: ImportSpec) -> Self {
        self.attach(spec)
    }
}
