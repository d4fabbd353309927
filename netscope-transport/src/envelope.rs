use serde::{Deserialize, Serialize};

/// Unary or streamed invocation request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenericRequest {
    /// Concrete type or interface simple name.
    pub type_name: String,
    pub operation: String,
    /// JSON array of positional arguments. Empty means no arguments.
    pub arguments_json: String,
    pub api_key: String,
}

impl GenericRequest {
    pub fn new(type_name: impl Into<String>, operation: impl Into<String>) -> Self {
        GenericRequest {
            type_name: type_name.into(),
            operation: operation.into(),
            ..Default::default()
        }
    }

    pub fn with_arguments(mut self, arguments_json: impl Into<String>) -> Self {
        self.arguments_json = arguments_json.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// `<type_name>.<operation>`, the key the registry is queried with.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.type_name, self.operation)
    }

    /// The supplied credential, treating an empty string as absent.
    pub fn credential(&self) -> Option<&str> {
        Some(self.api_key.as_str()).filter(|key| !key.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenericResponse {
    pub result_json: String,
    pub success: bool,
    pub status_code: u16,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error_message: String,
}

impl GenericResponse {
    pub fn ok(result_json: impl Into<String>) -> Self {
        GenericResponse {
            result_json: result_json.into(),
            success: true,
            status_code: 200,
            error_message: String::new(),
        }
    }

    pub fn error(status_code: u16, message: impl Into<String>) -> Self {
        GenericResponse {
            result_json: String::new(),
            success: false,
            status_code,
            error_message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocsRequest {}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsResponse {
    pub methods: Vec<MethodInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodInfo {
    pub type_name: String,
    pub operation: String,
    pub path: String,
    pub restricted: bool,
    pub return_type: String,
    pub parameters: Vec<ParameterInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub index: u32,
}

/// Client-to-server frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum RpcCall {
    Invoke { id: u64, request: GenericRequest },
    Docs { id: u64 },
    /// One message of a client stream. The first message opens the stream.
    Stream { stream: u64, request: GenericRequest },
    /// The client finished sending on `stream`.
    EndStream { stream: u64 },
}

/// Server-to-client frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum RpcReply {
    Response { id: u64, response: GenericResponse },
    Docs { id: u64, response: DocsResponse },
    StreamItem { stream: u64, response: GenericResponse },
    StreamEnd { stream: u64 },
    /// A call that produced no typed response, such as a failed docs export.
    Error {
        id: u64,
        status_code: u16,
        message: String,
    },
}
