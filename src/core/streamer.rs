use crate::domain::ports::FragmentStream;
use crate::utils::error::Result;
use futures::StreamExt;
use std::io::Write;

/// Drains `stream` into one string, echoing each fragment to `echo` as it
/// arrives. The first stream error aborts collection.
pub async fn collect_response<W: Write>(mut stream: FragmentStream, echo: &mut W) -> Result<String> {
    let mut full_response = String::new();
    let mut fragments = 0usize;

    while let Some(fragment) = stream.next().await {
        let fragment = fragment?;
        echo.write_all(fragment.as_bytes())?;
        echo.flush()?;
        full_response.push_str(&fragment);
        fragments += 1;
    }

    tracing::debug!(
        "Model stream finished: {} fragments, {} bytes",
        fragments,
        full_response.len()
    );
    Ok(full_response)
}
