use std::fmt;

/// Failure to read a document from a [`crate::DocumentSource`].
#[derive(Debug)]
pub enum FetchError {
    Missing(String),
    Io(std::io::Error),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Missing(name) => write!(f, "document {name:?} not found"),
            FetchError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<std::io::Error> for FetchError {
    fn from(value: std::io::Error) -> Self {
        FetchError::Io(value)
    }
}

/// One of the primary documents (word records, search index) is unusable.
#[derive(Debug)]
pub enum LoadError {
    Fetch {
        document: &'static str,
        source: FetchError,
    },
    Parse {
        document: &'static str,
        source: serde_json::Error,
    },
}

impl LoadError {
    pub fn document(&self) -> &'static str {
        match self {
            LoadError::Fetch { document, .. } | LoadError::Parse { document, .. } => *document,
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Fetch { document, source } => {
                write!(f, "failed to fetch {document}: {source}")
            }
            LoadError::Parse { document, source } => {
                write!(f, "failed to parse {document}: {source}")
            }
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Fetch { source, .. } => Some(source),
            LoadError::Parse { source, .. } => Some(source),
        }
    }
}

/// An optional document (coordinates, demo data) could not be used.
#[derive(Debug)]
pub struct OptionalLoadError(pub LoadError);

impl fmt::Display for OptionalLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "optional document skipped: {}", self.0)
    }
}

impl std::error::Error for OptionalLoadError {}

impl From<LoadError> for OptionalLoadError {
    fn from(value: LoadError) -> Self {
        OptionalLoadError(value)
    }
}

/// Startup could not produce any usable dataset.
#[derive(Debug)]
pub enum InitializationError {
    EmptyDataset,
    BuiltinDemo(String),
    Index(String),
}

impl fmt::Display for InitializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitializationError::EmptyDataset => {
                write!(f, "no words available; reload the page after fixing the data directory")
            }
            InitializationError::BuiltinDemo(err) => {
                write!(f, "built-in demo dataset is corrupt ({err}); reload the page")
            }
            InitializationError::Index(err) => {
                write!(f, "failed to index vocabulary ({err}); reload the page")
            }
        }
    }
}

impl std::error::Error for InitializationError {}

/// Lookup miss, reported to the user rather than propagated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordNotFound {
    pub word: String,
}

impl fmt::Display for WordNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "word {:?} is not in the dataset", self.word)
    }
}

impl std::error::Error for WordNotFound {}

/// Precomputed visualization data that cannot be rendered as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    Misaligned {
        words: usize,
        statuses: usize,
        coords: usize,
    },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::Misaligned {
                words,
                statuses,
                coords,
            } => write!(
                f,
                "visualization data misaligned: {words} words, {statuses} statuses, {coords} coords"
            ),
        }
    }
}

impl std::error::Error for LayoutError {}
