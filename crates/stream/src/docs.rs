//! OpenAPI document for the HTTP API.
//!
//! Event-stream responses are described per event with the
//! OpenAPI 3.2 `itemSchema` field rather than as an array, each item referencing a reusable
//! `Event` schema whose `data` carries the JSON record.

use schemars::{JsonSchema, schema_for};
use serde_json::{Value, json};
use tickstream_types::{Country, constants::APPLICATION_NAME};

/// Name of the reusable schema describing a server-sent event.
pub const EVENT_SCHEMA_NAME: &str = "Event";

/// Path of the generated document.
pub const API_DOCS_PATH: &str = "/v3/api-docs";

/// A server-sent event, as defined by the HTML standard.
#[derive(JsonSchema)]
#[allow(dead_code)]
struct Event {
    /// The event payload
    data: Option<String>,
    /// The event type
    event: Option<String>,
    /// The event ID
    id: Option<String>,
    /// The reconnection time (in milliseconds)
    retry: Option<u64>,
}

/// Schema of `T` suitable for `components.schemas`.
fn component_schema<T: JsonSchema>() -> Value {
    let mut schema = serde_json::to_value(schema_for!(T)).unwrap_or_default();
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
    }
    schema
}

fn schema_ref(name: &str) -> Value {
    json!({ "$ref": format!("#/components/schemas/{}", name) })
}

/// Item schema for an event stream whose `data` is a JSON-encoded `record`.
fn event_item_schema(record: &str) -> Value {
    let mut item = schema_ref(EVENT_SCHEMA_NAME);
    item["oneOf"] = json!([{
        "properties": {
            "data": {
                "contentMediaType": "application/json",
                "contentSchema": schema_ref(record),
            }
        }
    }]);
    item
}

/// Build the OpenAPI document for the countries API.
pub fn api_document(tag: &str) -> Value {
    json!({
        "openapi": "3.2.0",
        "info": {
            "title": APPLICATION_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        },
        "paths": {
            "/countries": {
                "get": {
                    "tags": ["countries"],
                    "summary": "Gets all country data.",
                    "operationId": "getCountries",
                    "responses": {
                        "200": {
                            "description": "OK",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "array",
                                        "items": schema_ref("Country"),
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "/countries/stream": {
                "get": {
                    "tags": ["countries"],
                    "summary": "Streams country data as a continuous flow of Server-Sent Events.",
                    "description": format!(
                        "Emits one `{}` event per interval. Reconnect with the last received \
                         event ID in `Last-Event-ID` to resume the stream.",
                        tag
                    ),
                    "operationId": "getCountriesStream",
                    "parameters": [{
                        "name": "Last-Event-ID",
                        "in": "header",
                        "required": false,
                        "schema": { "type": "string" },
                    }],
                    "responses": {
                        "200": {
                            "description": "OK",
                            "content": {
                                "text/event-stream": {
                                    "itemSchema": event_item_schema("Country"),
                                }
                            }
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Country": component_schema::<Country>(),
                EVENT_SCHEMA_NAME: component_schema::<Event>(),
            }
        }
    })
}
