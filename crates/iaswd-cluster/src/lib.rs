//! IAS WD (warning device) cluster definitions
//!
//! Static schema for the siren/doorbell variant of the Intrusion Alarm System
//! Warning Device cluster, plus ZCL frame encoding for the two operations the
//! controllers issue against it: Write Attributes and `startWarning`.

pub mod error;
pub mod frame;
pub mod schema;

pub use error::ZclError;
pub use frame::{FrameType, ZclFrame, WRITE_ATTRIBUTES};
pub use schema::{
    warning_info, Attribute, AttributeWrite, Command, DataType, DoorbellTrigger, CLUSTER_ID,
    CLUSTER_NAME,
};
