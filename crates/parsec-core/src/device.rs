use serde::{Deserialize, Serialize};

use crate::certificate::SignedCertificate;
use crate::types::{DeviceId, Timestamp, UserId, VerifyKey};

/// A key-holding agent belonging to a `User`. A user may own many devices;
/// revoking the user implicitly revokes access for all of them, though the
/// device records themselves are never deleted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Device {
    pub device_id: DeviceId,
    pub user_id: UserId,
    pub device_label: Option<String>,
    pub verify_key: VerifyKey,
    pub created_by: Option<DeviceId>,
    pub created_on: Timestamp,
    pub certificate: SignedCertificate,
}
