//! Built-in auth tables.
//!
//! Plugins add their own models next to these; the registry treats both the
//! same way.

use super::{FieldDef, ModelDef, Schema, SchemaBuilder};
use crate::error::Result;

/// `createdAt` / `updatedAt`, both stamped on create.
pub fn timestamps() -> [FieldDef; 2] {
    [
        FieldDef::date("createdAt").required().default_now(),
        FieldDef::date("updatedAt").required().default_now(),
    ]
}

pub fn user() -> ModelDef {
    ModelDef::new("user")
        .field(FieldDef::string("name").required())
        .field(FieldDef::string("email").required().unique())
        .field(FieldDef::boolean("emailVerified").required().default_value(false))
        .field(FieldDef::string("image"))
        .fields_from(timestamps())
}

pub fn session() -> ModelDef {
    ModelDef::new("session")
        .field(FieldDef::date("expiresAt").required())
        .field(FieldDef::string("token").required().unique())
        .field(FieldDef::string("ipAddress"))
        .field(FieldDef::string("userAgent"))
        .field(FieldDef::string("userId").required().references("user", "id"))
        .fields_from(timestamps())
}

pub fn account() -> ModelDef {
    ModelDef::new("account")
        .field(FieldDef::string("accountId").required())
        .field(FieldDef::string("providerId").required())
        .field(FieldDef::string("userId").required().references("user", "id"))
        .field(FieldDef::string("accessToken").hidden())
        .field(FieldDef::string("refreshToken").hidden())
        .field(FieldDef::string("idToken").hidden())
        .field(FieldDef::date("accessTokenExpiresAt"))
        .field(FieldDef::date("refreshTokenExpiresAt"))
        .field(FieldDef::string("scope"))
        .field(FieldDef::string("password").hidden())
        .fields_from(timestamps())
}

pub fn verification() -> ModelDef {
    ModelDef::new("verification")
        .field(FieldDef::string("identifier").required())
        .field(FieldDef::string("value").required())
        .field(FieldDef::date("expiresAt").required())
        .field(FieldDef::date("createdAt").default_now())
        .field(FieldDef::date("updatedAt").default_now())
}

/// Request counters keyed by client + path.
pub fn rate_limit() -> ModelDef {
    ModelDef::new("rateLimit")
        .field(FieldDef::string("key").required().unique())
        .field(FieldDef::number("count").required())
        .field(FieldDef::number("lastRequest").required())
}

/// Signing key material; the newest row is the active key.
pub fn jwks() -> ModelDef {
    ModelDef::new("jwks")
        .field(FieldDef::string("publicKey").required())
        .field(FieldDef::string("privateKey").required().hidden())
        .field(FieldDef::date("createdAt").required().default_now())
}

pub fn auth_models() -> Vec<ModelDef> {
    vec![
        user(),
        session(),
        account(),
        verification(),
        rate_limit(),
        jwks(),
    ]
}

/// Builder pre-loaded with the auth tables, ready for plugin models.
pub fn auth_schema_builder() -> SchemaBuilder {
    Schema::builder().models(auth_models())
}

pub fn auth_schema() -> Result<Schema> {
    auth_schema_builder().build()
}
