//! Built-in datacenter tables used when no credential file can be read.

/// Which Telegram deployment the session talks to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DcEnvironment {
    #[default]
    Production,
    Test,
}

/// Port every bootstrap datacenter listens on.
pub const DEFAULT_PORT: u16 = 443;

const PRODUCTION_DCS: &[(i32, &str)] = &[
    (1, "149.154.175.50"),
    (2, "149.154.167.51"),
    (3, "149.154.175.100"),
    (4, "149.154.167.91"),
    (5, "149.154.171.5"),
];

const TEST_DCS: &[(i32, &str)] = &[
    (1, "149.154.175.10"),
    (2, "149.154.167.40"),
    (3, "149.154.175.117"),
];

/// Bootstrap `(dc_id, ip)` pairs for `environment`.
pub fn default_dcs(environment: DcEnvironment) -> &'static [(i32, &'static str)] {
    match environment {
        DcEnvironment::Production => PRODUCTION_DCS,
        DcEnvironment::Test       => TEST_DCS,
    }
}

/// The working datacenter selected on a fresh session.
pub fn default_working_dc(environment: DcEnvironment) -> i32 {
    match environment {
        DcEnvironment::Production => 2,
        DcEnvironment::Test       => 2,
    }
}
