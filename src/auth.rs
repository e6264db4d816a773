use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::{AuthError, ParseEnumError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Student,
    Advisor,
    Supervisor,
    ViceDean,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Advisor => "advisor",
            Self::Supervisor => "supervisor",
            Self::ViceDean => "vice_dean",
            Self::Admin => "admin",
        }
    }

    pub fn is_reviewer(&self) -> bool {
        !matches!(self, Self::Student)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "student" | "mahasiswa" => Ok(Self::Student),
            "advisor" | "dosen_pa" => Ok(Self::Advisor),
            "supervisor" => Ok(Self::Supervisor),
            "vice_dean" | "waket3" => Ok(Self::ViceDean),
            "admin" => Ok(Self::Admin),
            _ => Err(ParseEnumError::new("role", value)),
        }
    }
}

/// The authenticated user a command acts on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
    pub student_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SubmitRecord { student_id: Uuid },
    ReviewRecord,
    ViewSummary { student_id: Uuid },
    ViewRecap,
    ManageCategories,
    ImportRecords,
}

impl Action {
    fn describe(&self) -> &'static str {
        match self {
            Self::SubmitRecord { .. } => "submit activity records for this student",
            Self::ReviewRecord => "review activity records",
            Self::ViewSummary { .. } => "view this student's point summary",
            Self::ViewRecap => "view the point recapitulation",
            Self::ManageCategories => "manage point categories",
            Self::ImportRecords => "import activity records",
        }
    }
}

pub fn authorize(principal: &Principal, action: Action) -> Result<(), AuthError> {
    let allowed = match action {
        Action::SubmitRecord { student_id } | Action::ViewSummary { student_id } => {
            match principal.role {
                Role::Student => {
                    let own = principal
                        .student_id
                        .ok_or(AuthError::MissingStudentProfile(principal.user_id))?;
                    own == student_id
                }
                Role::Admin => true,
                role => matches!(action, Action::ViewSummary { .. }) && role.is_reviewer(),
            }
        }
        Action::ReviewRecord | Action::ViewRecap => principal.role.is_reviewer(),
        Action::ManageCategories => matches!(principal.role, Role::Admin | Role::ViceDean),
        Action::ImportRecords => principal.role == Role::Admin,
    };

    if allowed {
        Ok(())
    } else {
        tracing::warn!(
            user_id = %principal.user_id,
            role = %principal.role,
            "denied: {}",
            action.describe()
        );
        Err(AuthError::Forbidden {
            role: principal.role,
            action: action.describe(),
        })
    }
}

/// Authorizes an action on a student looked up by NIM, before revealing whether
/// that NIM exists.
///
/// Students get `Forbidden` for any NIM other than their own, registered or not.
/// Other roles are checked at role level when the student is missing, so the
/// caller may report the missing student only to someone allowed to act on it.
pub fn authorize_for_student(
    principal: &Principal,
    student_id: Option<Uuid>,
    action: impl Fn(Uuid) -> Action,
) -> Result<(), AuthError> {
    match (student_id, principal.role) {
        (Some(student_id), _) => authorize(principal, action(student_id)),
        (None, Role::Student) => {
            let denied = action(Uuid::nil());
            tracing::warn!(user_id = %principal.user_id, "denied: {}", denied.describe());
            Err(AuthError::Forbidden {
                role: principal.role,
                action: denied.describe(),
            })
        }
        (None, _) => authorize(principal, action(Uuid::nil())),
    }
}
