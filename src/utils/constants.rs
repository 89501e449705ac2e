/// Dimension names
pub const LAT_DIM: &str = "lat";
pub const LON_DIM: &str = "lon";

/// Variable names
pub const TIME_VAR: &str = "time";
pub const LAT_VAR: &str = "lat";
pub const LON_VAR: &str = "lon";
pub const METHANE_VAR: &str = "xch4";

/// Time decoding for the `time` variable
pub const TIME_UNITS: &str = "seconds since 1970-1-1 0:0:0.0";
pub const TIME_CALENDAR: &str = "gregorian";

/// Groups whose variable attributes are stored as file metadata, in merge order
pub const METADATA_GROUPS: [&str; 2] = ["apriori_data", "geolocation"];

/// Sidecar descriptor extension (replaces the dataset extension)
pub const SIDECAR_EXTENSION: &str = "xml";

/// Dataset extension used when expanding a directory
pub const DATASET_EXTENSION: &str = "nc";

/// Statements
pub const INSERT_FILE_SQL: &str = "INSERT INTO methane_data_file (file_name, metadata) \
     VALUES ($1, $2) RETURNING methane_data_file_id";
pub const INSERT_FILE_WITH_SIDECAR_SQL: &str =
    "INSERT INTO methane_data_file (file_name, metadata, xmlmetadata) \
     VALUES ($1, $2, $3) RETURNING methane_data_file_id";
pub const SELECT_FILE_ID_SQL: &str =
    "SELECT methane_data_file_id FROM methane_data_file WHERE file_name = $1";
pub const INSERT_MEASUREMENT_SQL: &str = "INSERT INTO methane_data \
     (methane_data_file_id, recorded_at, latitude, longitude, methane) \
     VALUES ($1, $2, $3, $4, $5)";

/// Connection defaults
pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 5432;

/// Process exit codes
pub const EXIT_CONNECTION_FAILURE: u8 = 1;
pub const EXIT_FATAL: u8 = 2;
