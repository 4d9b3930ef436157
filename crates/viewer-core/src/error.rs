use pdf_engine::PdfEngineError;
use std::path::PathBuf;

/// Why a document could not be opened.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpenFailure {
    #[error("the file does not exist")]
    Missing,
    #[error("the file is not a .pdf file")]
    WrongExtension,
    #[error("the document is password protected")]
    Encrypted,
    #[error("the document has no pages")]
    Empty,
    #[error("the file is not a readable PDF ({0})")]
    Corrupt(String),
}

impl From<PdfEngineError> for OpenFailure {
    fn from(err: PdfEngineError) -> Self {
        match err {
            PdfEngineError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => Self::Missing,
            PdfEngineError::Encrypted => Self::Encrypted,
            PdfEngineError::Empty => Self::Empty,
            other => Self::Corrupt(other.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("could not open {}: {reason}", .path.display())]
    Open { path: PathBuf, reason: OpenFailure },
    #[error("failed to render page {}: {source}", .page + 1)]
    Render {
        page: u32,
        #[source]
        source: PdfEngineError,
    },
    #[error("search failed: {0}")]
    Search(#[source] PdfEngineError),
    #[error("search query is empty")]
    EmptyQuery,
    #[error("no document is open")]
    NoDocument,
    #[error("page {} does not exist (document has {page_count} pages)", .page + 1)]
    PageOutOfRange { page: u32, page_count: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_open_failures() {
        let missing = PdfEngineError::Io(std::io::Error::from(std::io::ErrorKind::NotFound));
        let denied = PdfEngineError::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied));

        assert_eq!(OpenFailure::from(missing), OpenFailure::Missing);
        assert_eq!(OpenFailure::from(PdfEngineError::Encrypted), OpenFailure::Encrypted);
        assert_eq!(OpenFailure::from(PdfEngineError::Empty), OpenFailure::Empty);
        assert!(matches!(OpenFailure::from(denied), OpenFailure::Corrupt(_)));
        assert!(matches!(
            OpenFailure::from(PdfEngineError::InvalidFormat("bad xref".into())),
            OpenFailure::Corrupt(message) if message.contains("bad xref")
        ));
    }

    #[test]
    fn page_numbers_in_messages_are_one_based() {
        let err = ViewerError::Render { page: 0, source: PdfEngineError::Backend("boom".into()) };
        assert_eq!(err.to_string(), "failed to render page 1: backend error: boom");

        let err = ViewerError::PageOutOfRange { page: 4, page_count: 3 };
        assert_eq!(err.to_string(), "page 5 does not exist (document has 3 pages)");
    }
}
