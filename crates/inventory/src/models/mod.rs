mod record;

pub use self::record::{InventoryRecord, MAX_PATH_LENGTH, RecordDraft, RecordId};
pub(crate) use self::record::{RecordRow, path_to_string};
