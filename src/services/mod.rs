/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Composition of lobby-wide and private player events.
pub mod lobby_events;
/// Lobby dispatcher owning every lobby and applying player requests in order.
pub mod lobby_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
