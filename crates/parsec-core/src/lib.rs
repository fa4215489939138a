pub mod certificate;
pub mod constants;
pub mod device;
pub mod error;
pub mod invitation;
pub mod organization;
pub mod realm;
pub mod topic;
pub mod types;
pub mod user;
pub mod vlob;

pub use certificate::{Certificate, SignedCertificate};
pub use constants::*;
pub use device::Device;
pub use error::ParsecCoreError;
pub use invitation::{Invitation, InvitationStatus, InvitationType};
pub use organization::{
    Organization, OrganizationStats, OrganizationStatsProfileDetailItem, SequesterAuthority,
    SequesterService, TermsOfService,
};
pub use realm::{KeyRotation, Realm, RealmRename, RealmRoleEntry};
pub use topic::{Topic, TopicWatermarks};
pub use types::*;
pub use user::{ProfileUpdate, User};
pub use vlob::{Vlob, VlobVersion};
