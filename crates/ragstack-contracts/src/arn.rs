//! Resource name builders for identifiers the provider derives
//! deterministically.

/// Managed policy granting a function permission to write its logs.
pub const FUNCTION_BASIC_EXECUTION_POLICY: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

pub fn bucket(bucket: &str) -> String {
    format!("arn:aws:s3:::{bucket}")
}

/// Every object inside a bucket.
pub fn bucket_objects(bucket: &str) -> String {
    format!("arn:aws:s3:::{bucket}/*")
}

pub fn object(bucket: &str, key: &str) -> String {
    format!("arn:aws:s3:::{bucket}/{key}")
}

pub fn foundation_model(region: &str, model_id: &str) -> String {
    format!("arn:aws:bedrock:{region}::foundation-model/{model_id}")
}

pub fn agent(region: &str, account_id: &str, agent_id: &str) -> String {
    format!("arn:aws:bedrock:{region}:{account_id}:agent/{agent_id}")
}

pub fn account_root(account_id: &str) -> String {
    format!("arn:aws:iam::{account_id}:root")
}

/// A customer-managed policy.
pub fn policy(account_id: &str, name: &str) -> String {
    format!("arn:aws:iam::{account_id}:policy/{name}")
}
