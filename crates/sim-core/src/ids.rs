//! String identifiers for every entity in a simulation.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Simulation identifier, e.g. "sim_demo".
    SimulationId
);
string_id!(
    /// Company identifier.
    CompanyId
);
string_id!(
    /// Product identifier.
    ProductId
);
string_id!(
    /// Decision identifier.
    DecisionId
);
string_id!(
    /// Identifier of an authenticated user, supplied by the session layer.
    UserId
);
string_id!(
    /// Loan identifier inside a company's data blob.
    LoanId
);
string_id!(
    /// Market conditions snapshot identifier.
    MarketConditionsId
);
string_id!(
    /// Market event identifier.
    EventId
);
