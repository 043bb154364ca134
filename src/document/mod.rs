mod intake;

pub use intake::{classify, prepare, DocumentError, FileKind, PayslipInput, UploadedFile};
