//! Contracts and contract calls.
//!
//! A contract is a function unit deployed by a user and executed by the
//! engine. It declares the most fuel a single execution may burn; the tier
//! table turns that budget into a maximum execution time.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};
use crate::fuel::{Fuel, FuelTiers};
use crate::user::{User, UserId};

/// Identifier of a contract.
pub type ContractId = i64;

/// Who may see and call a contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Visibility {
    /// Only the owner.
    #[default]
    Private,
    /// Everyone.
    Public,
}

impl Visibility {
    /// The wire name of this visibility.
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Public => "public",
        }
    }
}

impl FromStr for Visibility {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Visibility::Private),
            "public" => Ok(Visibility::Public),
            other => Err(ValidationError::InvalidVisibility(other.to_string())),
        }
    }
}

impl TryFrom<String> for Visibility {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A revision of a contract's source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    /// Identifier of the revision.
    pub id: i64,
    /// Sequence number within the contract, starting at 1.
    pub rev: u32,
    /// Contract this revision belongs to.
    pub contract_id: ContractId,
    /// Language version of the code.
    pub version: String,
    /// Free-form release notes.
    #[serde(default)]
    pub notes: String,
    /// Source code of the revision.
    pub code: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A user-deployed function unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    /// Identifier, zero until persisted.
    pub id: ContractId,
    /// Contract name.
    pub name: String,
    /// Human description.
    #[serde(default)]
    pub description: String,
    /// Owner of the contract.
    pub user_id: UserId,
    /// Who may call the contract.
    pub visibility: Visibility,
    /// The most fuel a single execution may burn.
    pub max_fuel: Fuel,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
    /// Latest revision, when loaded.
    #[serde(default)]
    pub last_revision: Option<Revision>,
    /// Owner, when loaded.
    #[serde(default)]
    pub user: Option<User>,
}

impl Contract {
    /// Create a private contract owned by `user_id`.
    pub fn new(name: impl Into<String>, user_id: UserId, max_fuel: Fuel) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: name.into(),
            description: String::new(),
            user_id,
            visibility: Visibility::Private,
            max_fuel,
            created_at: now,
            updated_at: now,
            last_revision: None,
            user: None,
        }
    }

    /// Set the identifier.
    pub fn with_id(mut self, id: ContractId) -> Self {
        self.id = id;
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the visibility.
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Attach the latest revision.
    pub fn with_revision(mut self, revision: Revision) -> Self {
        self.last_revision = Some(revision);
        self
    }

    /// Maximum execution time allowed by `tiers` for this contract.
    pub fn max_execution_time(&self, tiers: &FuelTiers) -> Duration {
        tiers.max_execution_time(self.max_fuel)
    }

    /// Validate the contract fields.
    ///
    /// Visibility is checked when it is parsed, so a `Contract` value always
    /// carries a valid one.
    pub fn validate(&self) -> ValidationResult<()> {
        if self.name.is_empty() {
            return Err(ValidationError::ContractNameRequired);
        }
        if self.user_id == 0 {
            return Err(ValidationError::OwnerRequired);
        }
        if self.max_fuel.is_zero() {
            return Err(ValidationError::MaxFuelRequired);
        }
        Ok(())
    }
}

/// Anything the scheduler can execute.
///
/// The scheduler only needs to know how much fuel to pre-pay.
pub trait VmCaller {
    /// Upper bound of fuel the call may burn.
    fn max_fuel(&self) -> Fuel;
}

impl VmCaller for Contract {
    fn max_fuel(&self) -> Fuel {
        self.max_fuel
    }
}

/// A request to execute a contract with some input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractCall {
    /// Snapshot of the contract to run.
    pub contract: Contract,
    /// Input passed to the contract body.
    #[serde(default)]
    pub input: serde_json::Value,
}

impl ContractCall {
    /// Create a call without input.
    pub fn new(contract: Contract) -> Self {
        Self {
            contract,
            input: serde_json::Value::Null,
        }
    }

    /// Set the input.
    pub fn with_input(mut self, input: serde_json::Value) -> Self {
        self.input = input;
        self
    }

    /// Identifier of the called contract.
    pub fn contract_id(&self) -> ContractId {
        self.contract.id
    }
}

impl VmCaller for ContractCall {
    fn max_fuel(&self) -> Fuel {
        self.contract.max_fuel
    }
}
