/// Router Module Index
///
/// Routes are split by access level so that the gate is applied once per
/// module (via `route_layer`) instead of per handler.

/// Routes reachable without a credential.
pub mod public;

/// Routes behind the bearer-token gate.
pub mod authenticated;

/// Account moderation routes, nested under `/admin` and also gated.
pub mod admin;
