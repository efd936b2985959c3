use uuid::Uuid;

/// Stable identity of a reserved slot. Survives renumbering; a removed or
/// reset slot's id never resolves again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(Uuid);

impl SlotId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SlotId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Self-describing encoded image: MIME type plus base64 body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlinePayload {
    pub mime_type: String,
    pub base64: String,
}

impl InlinePayload {
    /// Data-URL form used for previews.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }

    /// Base64 body with the descriptor prefix stripped, as transmitted
    /// on the wire.
    pub fn base64_body(&self) -> &str {
        &self.base64
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadState {
    /// Slot reserved, decode still outstanding.
    Pending,
    Ready(InlinePayload),
    Failed(String),
}

impl PayloadState {
    pub fn is_ready(&self) -> bool {
        matches!(self, PayloadState::Ready(_))
    }

    pub fn payload(&self) -> Option<&InlinePayload> {
        match self {
            PayloadState::Ready(p) => Some(p),
            _ => None,
        }
    }
}

/// One entry in the ordered collection. The ordinal index is positional
/// and lives in the store; records carry identity and payload only.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub id: SlotId,
    pub state: PayloadState,
    pub source_name: String,
    pub content_hash: Option<String>,
}

impl UploadedImage {
    pub fn pending(source_name: &str) -> Self {
        Self {
            id: SlotId::new(),
            state: PayloadState::Pending,
            source_name: source_name.to_string(),
            content_hash: None,
        }
    }
}
