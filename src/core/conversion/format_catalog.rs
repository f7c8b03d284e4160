// Static registry of the document formats we know how to convert.
//
// Each Google Workspace format maps to exactly one Office format. The table is
// tiny and fixed, so lookups are plain linear scans over a static table.

/// One supported document type: the Google mime type, the Office mime type it
/// exports to, and the extension appended to the converted copy's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatMapping {
    pub native_mime_type: &'static str,
    pub foreign_mime_type: &'static str,
    /// No leading dot.
    pub extension: &'static str,
}

impl FormatMapping {
    /// Name of the converted copy, e.g. `Budget` -> `Budget.xlsx`.
    pub fn target_file_name(&self, source_name: &str) -> String {
        format!("{}.{}", source_name, self.extension)
    }
}

pub const DOCUMENT: FormatMapping = FormatMapping {
    native_mime_type: "application/vnd.google-apps.document",
    foreign_mime_type: "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    extension: "docx",
};

pub const SPREADSHEET: FormatMapping = FormatMapping {
    native_mime_type: "application/vnd.google-apps.spreadsheet",
    foreign_mime_type: "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    extension: "xlsx",
};

pub const PRESENTATION: FormatMapping = FormatMapping {
    native_mime_type: "application/vnd.google-apps.presentation",
    foreign_mime_type:
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    extension: "pptx",
};

static ALL_MAPPINGS: [FormatMapping; 3] = [DOCUMENT, SPREADSHEET, PRESENTATION];

/// Which way a file would be converted, resolved from its mime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionDirection {
    /// Google format -> Office format. The only supported direction.
    NativeToForeign(&'static FormatMapping),
    /// Office format -> Google format. Resolvable, never implemented.
    ForeignToNative(&'static FormatMapping),
}

#[allow(dead_code)]
impl ConversionDirection {
    pub fn mapping(&self) -> &'static FormatMapping {
        match *self {
            ConversionDirection::NativeToForeign(mapping) => mapping,
            ConversionDirection::ForeignToNative(mapping) => mapping,
        }
    }
}

pub struct FormatCatalog;

impl FormatCatalog {
    pub fn lookup_by_native_type(mime_type: &str) -> Option<&'static FormatMapping> {
        ALL_MAPPINGS
            .iter()
            .find(|mapping| mapping.native_mime_type == mime_type)
    }

    pub fn lookup_by_foreign_type(mime_type: &str) -> Option<&'static FormatMapping> {
        ALL_MAPPINGS
            .iter()
            .find(|mapping| mapping.foreign_mime_type == mime_type)
    }

    /// Native mime types in catalog order. The batch driver enumerates files
    /// in this order.
    pub fn supported_native_types() -> Vec<&'static str> {
        ALL_MAPPINGS.iter().map(|m| m.native_mime_type).collect()
    }

    #[allow(dead_code)]
    pub fn supported_foreign_types() -> Vec<&'static str> {
        ALL_MAPPINGS.iter().map(|m| m.foreign_mime_type).collect()
    }

    /// Native lookup wins over foreign lookup; `None` for anything else.
    pub fn direction_for(mime_type: &str) -> Option<ConversionDirection> {
        if let Some(mapping) = Self::lookup_by_native_type(mime_type) {
            return Some(ConversionDirection::NativeToForeign(mapping));
        }
        Self::lookup_by_foreign_type(mime_type).map(ConversionDirection::ForeignToNative)
    }
}
