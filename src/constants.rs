// Object storage service
pub const SERVICE_HOST: &str = "blob.core.windows.net";
pub const SIGNED_SERVICE_VERSION: &str = "2021-08-06";

// Environment variable names for storage credentials
pub const ENV_ACCOUNT_NAME: &str = "ACCOUNT_NAME";
pub const ENV_ACCOUNT_KEY: &str = "ACCOUNT_KEY";
pub const ENV_CONTAINER_NAME: &str = "CONTAINER_NAME";

// Environment variable names for database credentials
pub const ENV_DB_SERVER: &str = "DB_SERVER";
pub const ENV_DB_NAME: &str = "DB_NAME";
pub const ENV_DB_USER: &str = "DB_USER";
pub const ENV_DB_PASSWORD: &str = "DB_PASSWORD";

// Default extraction layout
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_DB_EXPORT_DIR: &str = "data/db";
pub const DEFAULT_SOURCE_FOLDERS: &[&str] = &["machine_learning/", "nlp_data/", "product_eval/"];
pub const DEFAULT_ARCHIVE_FOLDER: &str = "machine_learning";
pub const DEFAULT_ARCHIVE_NAME: &str = "reviews.zip";

// Default table discovery bounds for database exports
pub const DEFAULT_DB_SCHEMAS: &[&str] = &["Person", "Production", "Sales"];
pub const DEFAULT_DB_EXCLUDE_PREFIX: &str = "v";
