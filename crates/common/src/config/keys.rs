//! Names of the environment variables and job parameters the loader reads.

pub const LOAD_FILE: &str = "LOAD_FILE";
pub const SNOWFLAKE_CRED_FILE: &str = "SNOWFLAKE_CRED_FILE";
pub const SNOWFLAKE_STAGE_NAME: &str = "SNOWFLAKE_STAGE_NAME";
pub const SNOWFLAKE_FILE_FORMAT_NAME: &str = "SNOWFLAKE_FILE_FORMAT_NAME";
pub const SNOWFLAKE_STORAGE_INT_NAME: &str = "SNOWFLAKE_STORAGE_INT_NAME";
pub const SNOWFLAKE_RAW_TABLE_NAME: &str = "SNOWFLAKE_RAW_TABLE_NAME";
pub const S3_STORAGE_AWS_ROLE_ARN: &str = "S3_STORAGE_AWS_ROLE_ARN";
pub const S3_STORAGE_ALLOWED_LOCATIONS: &str = "S3_STORAGE_ALLOWED_LOCATIONS";

pub const SNOWFLAKE_WAREHOUSE: &str = "SNOWFLAKE_WAREHOUSE";
pub const SNOWFLAKE_DATABASE: &str = "SNOWFLAKE_DATABASE";
pub const SNOWFLAKE_SCHEMA: &str = "SNOWFLAKE_SCHEMA";
pub const SNOWFLAKE_USERNAME: &str = "SNOWFLAKE_USERNAME";
pub const SNOWFLAKE_PASSWORD: &str = "SNOWFLAKE_PASSWORD";
pub const SNOWFLAKE_ACCOUNT: &str = "SNOWFLAKE_ACCOUNT";

pub const DEFAULT_SECRET_NAME: &str = "snowflake_credentials";
pub const DEFAULT_SECRET_REGION: &str = "ap-south-1";
