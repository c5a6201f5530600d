//! Response sanitization for generation service output.

/// Strip Markdown code-fence markers from a service response.
///
/// The generation service is asked for bare Mermaid code but routinely wraps
/// it in ```` ```mermaid ```` fences anyway. All ```` ```mermaid ```` markers
/// are removed first, then any remaining ```` ``` ```` markers, then the
/// result is trimmed. Replacement is global, not just at the edges, matching
/// the editor's observed behavior.
#[must_use]
pub fn strip_mermaid_fences(raw: &str) -> String {
    raw.replace("```mermaid", "")
        .replace("```", "")
        .trim()
        .to_string()
}
