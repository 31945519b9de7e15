//! # excel_io - spreadsheet export and import for routekit operations
//!
//! Any operation can be mirrored by a derived GET route that downloads its
//! data as an `.xlsx` attachment, and any operation can accept a spreadsheet
//! upload decoded into typed records.
//!
//! ```rust,ignore
//! use excel_io::prelude::*;
//!
//! OperationBuilder::get("/users")
//!     .export_handler(ExportSpec::of::<UserDto>().file_name("users"), list_users)
//!     .json_response(200, "Users")
//!     .register(routes)?;            // + GET /users/export
//!
//! OperationBuilder::post("/users/import")
//!     .import(ImportSpec::of::<UserDto>())
//!     .handler(|SheetImport(users): SheetImport<UserDto>| async move { /* ... */ })
//!     .json_response(200, "Imported")
//!     .register(routes)?;
//! ```

// === MODULE DEFINITION ===
pub mod module;
pub use module::ExcelIoModule;

// === INTERNAL MODULES ===
// Exposed for integration tests and for modules plugging in their own strategies.
#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod config;
#[doc(hidden)]
pub mod domain;

pub use api::rest::{OperationBuilderExportExt, OperationBuilderImportExt, RawSheet, SheetImport};
pub use config::ExcelIoConfig;
pub use domain::binding::{ExportSpec, ImportSpec, RequestArgs};
pub use domain::chain::Ranked;
pub use domain::codec::{TableCodec, XlsxCodec, XLSX_CONTENT_TYPE};
pub use domain::error::InterchangeError;
pub use domain::processor::{ExportJob, ExportProcessor};
pub use domain::reader::SheetReader;
pub use domain::record::{ColumnKind, RecordSchema, Tabular};
pub use domain::sink::ResponseSink;
pub use domain::wrapper::ResponseWrapper;

/// Everything a module needs to declare exporting and importing operations.
pub mod prelude {
    pub use crate::{
        ColumnKind, ExportSpec, ImportSpec, OperationBuilderExportExt, OperationBuilderImportExt,
        RawSheet, RecordSchema, RequestArgs, SheetImport, Tabular,
    };
    pub use routekit::{OperationBuilder, Problem};
}
