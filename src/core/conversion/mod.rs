pub mod conversion_engine;
pub mod conversion_models;
pub mod conversion_service;
pub mod drive_store;
pub mod format_catalog;

#[allow(unused_imports)]
pub use conversion_engine::{
    convert_file, is_fresh_copy, ConversionContext, ConversionEngine, ConversionError,
};
#[allow(unused_imports)]
pub use conversion_models::{
    ConfigError, ConverterConfig, DriveFile, DriveFolder, ExportResponse, FileContent,
    FolderPolicy, PermissionLevel, DEFAULT_DRIVE_API_BASE_URL,
};
pub use conversion_service::ConversionService;
pub use drive_store::{DriveError, DriveStore, ExportTransport, TokenSource};
#[allow(unused_imports)]
pub use format_catalog::{ConversionDirection, FormatCatalog, FormatMapping};
