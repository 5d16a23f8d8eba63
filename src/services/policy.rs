//! Role policy
//!
//! Maps each role to the capabilities it grants. `Admin` is a superset of
//! every other role; all other roles only match themselves.

use serde::Serialize;

use crate::models::Role;

/// Something a role is permitted to do in the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ManageUsers,
    ManageSettings,
    UploadFiles,
    ManageDoctors,
    ManageArticles,
    ManagePrograms,
    ManageParticipants,
    ManageAppointments,
    ViewAppointments,
    ViewParticipants,
    EnrollPrograms,
    TrackTasks,
    SelfAssessment,
}

const STAFF: &[Capability] = &[
    Capability::ManageArticles,
    Capability::ManagePrograms,
    Capability::ManageParticipants,
    Capability::ManageAppointments,
    Capability::ViewAppointments,
    Capability::ViewParticipants,
];

const DOCTOR: &[Capability] = &[Capability::ViewAppointments, Capability::ViewParticipants];

const PARTICIPANT: &[Capability] = &[
    Capability::EnrollPrograms,
    Capability::TrackTasks,
    Capability::SelfAssessment,
];

const ADMIN_ONLY: &[Capability] = &[
    Capability::ManageUsers,
    Capability::ManageSettings,
    Capability::UploadFiles,
    Capability::ManageDoctors,
];

/// Capabilities granted to `role`, without duplicates.
pub fn capabilities(role: Role) -> Vec<Capability> {
    match role {
        Role::Admin => {
            let mut all: Vec<Capability> = Vec::new();
            for cap in ADMIN_ONLY.iter().chain(STAFF).chain(DOCTOR).chain(PARTICIPANT) {
                if !all.contains(cap) {
                    all.push(*cap);
                }
            }
            all
        }
        Role::Staff => STAFF.to_vec(),
        Role::Doctor => DOCTOR.to_vec(),
        Role::Participant => PARTICIPANT.to_vec(),
    }
}

/// Whether a holder of `actual` may act as `required`.
pub fn has_role(actual: Role, required: Role) -> bool {
    actual == Role::Admin || actual == required
}

pub fn can(role: Role, capability: Capability) -> bool {
    capabilities(role).contains(&capability)
}
