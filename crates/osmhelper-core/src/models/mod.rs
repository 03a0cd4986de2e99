//! Data models for OSM entities.
//!
//! OSM payloads are loosely typed, so each model parses from
//! `serde_json::Value` with field aliases rather than deriving `Deserialize`
//! on the wire shape:
//!
//! - `Section`, `Term`, `UserProfile`: the `/oauth/resource` document
//! - `Member`, `ApplicantDetails`, `ApplicantNotes`: member and applicant records
//! - `EquipmentList`, `EquipmentItem`: quartermaster lists
//! - `BankAccount`, `BankTransfer`: finances

pub mod equipment;
pub mod finance;
pub mod member;
pub mod section;

pub use equipment::{EquipmentChanges, EquipmentField, EquipmentItem, EquipmentList};
pub use finance::{finance_rows, BankAccount, BankTransfer};
pub use member::{individual_record, member_rows, ApplicantDetails, ApplicantNotes, Member};
pub use section::{normalize_sections, Section, Term, UserProfile, NO_TERM};
