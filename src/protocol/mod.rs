pub(crate) mod bulk;
pub(crate) mod dataset_transfer;
pub(crate) mod messages;
