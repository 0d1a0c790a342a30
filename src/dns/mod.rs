//! DNS Verifier
//!
//! Public-DNS health checks for sending domains, plus opportunistic record
//! publishing into managed zones.

mod records;
mod resolver;
mod verifier;
mod zone;

pub use records::*;
pub use resolver::{parse_doh_response, DnsResolver, DohResolver, RecordType, ResolveError, DOH_ENDPOINTS};
pub use verifier::{
    classify, DnsVerifier, DomainVerification, OverallStatus, RecordCheck, RecordStatus, SesStatus,
};
pub use zone::{best_zone_match, provision_records, DnsProvisioning, DnsZoneManager, HostedZone};

#[cfg(feature = "aws")]
pub use zone::Route53ZoneManager;

#[cfg(test)]
pub(crate) use verifier::testing::FakeResolver;
#[cfg(test)]
pub(crate) use zone::testing::FakeZones;
