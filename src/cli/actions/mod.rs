pub mod server;

use secrecy::SecretString;

#[derive(Debug)]
pub enum Action {
    Server(Box<ServerArgs>),
}

#[derive(Debug)]
pub struct ServerArgs {
    pub port: u16,
    pub dsn: String,
    pub app_origin: String,
    pub access_token_secret: SecretString,
    pub access_token_expiry_seconds: i64,
    pub refresh_token_secret: SecretString,
    pub refresh_token_expiry_seconds: i64,
    pub one_time_token_expiry_minutes: i64,
    pub google: Option<GoogleArgs>,
}

#[derive(Debug)]
pub struct GoogleArgs {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
}
