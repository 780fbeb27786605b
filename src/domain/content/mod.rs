pub mod model;

pub use model::{
    compute_char_count, ContentKind, ContentPayload, EmphasisAction, GeneratedContent,
    Pronunciation, UploadedContent, WordTransformation, TAG_GENERATED, TAG_UPLOADED,
};
