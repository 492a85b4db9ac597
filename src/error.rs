use wasm_bindgen::JsValue;

#[derive(Debug)]
pub enum GpxViewerError {
    XmlParse(quick_xml::Error),
    /// The document ended while `open` elements were still unclosed.
    UnclosedElement {
        open: usize,
    },
    MissingRoot,
    MetadataRead(exif::Error),
    MissingGeoTag {
        tag: &'static str,
    },
}

impl GpxViewerError {
    /// True for errors raised while reading GPX text.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::XmlParse(_) | Self::UnclosedElement { .. } | Self::MissingRoot
        )
    }
}

impl std::fmt::Display for GpxViewerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::XmlParse(e) => write!(f, "XML parse error: {e}"),
            Self::UnclosedElement { open } => {
                write!(f, "XML parse error: document ended with {open} unclosed element(s)")
            }
            Self::MissingRoot => write!(f, "XML parse error: no root element"),
            Self::MetadataRead(e) => write!(f, "Image metadata read error: {e}"),
            Self::MissingGeoTag { tag } => write!(f, "Image has no usable '{tag}' geotag"),
        }
    }
}

impl std::error::Error for GpxViewerError {}

impl From<quick_xml::Error> for GpxViewerError {
    fn from(e: quick_xml::Error) -> Self {
        Self::XmlParse(e)
    }
}

impl From<exif::Error> for GpxViewerError {
    fn from(e: exif::Error) -> Self {
        Self::MetadataRead(e)
    }
}

impl From<GpxViewerError> for JsValue {
    fn from(e: GpxViewerError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}
