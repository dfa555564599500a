// -
// Discovery protocol

/// Type URL of every monitoring assignment payload.
pub const MONITORING_ASSIGNMENT_TYPE_URL: &str = "type.googleapis.com/mads.v1.MonitoringAssignment";

/// REST path answering long-poll fetches.
pub const FETCH_MONITORING_ASSIGNMENTS_PATH: &str = "/v3/discovery:monitoringassignments";

/// Query parameter overriding the server's default long-poll timeout.
pub const FETCH_TIMEOUT_QUERY_PARAM: &str = "fetch-timeout";

/// Group key shared by every client whose id the generator does not know.
pub const DEFAULT_CLIENT_ID: &str = "__default__";

// -
// Assignment labels

pub(crate) const MESH_LABEL: &str = "mesh";
pub(crate) const SERVICE_TAG: &str = "kuma.io/service";
pub(crate) const DATAPLANE_PATH_PREFIX: &str = "/meshes";
pub(crate) const SCRAPE_SCHEME: &str = "http";

// -
// Client target groups

pub(crate) const ADDRESS_LABEL: &str = "__address__";
pub(crate) const SCHEME_LABEL: &str = "__scheme__";
pub(crate) const METRICS_PATH_LABEL: &str = "__metrics_path__";
pub(crate) const JOB_LABEL: &str = "job";
pub(crate) const INSTANCE_LABEL: &str = "instance";
