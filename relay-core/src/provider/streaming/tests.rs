use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::StreamExt;

use super::*;

/// A body that yields `chunks` and bumps `released` when dropped.
fn body(chunks: Vec<Vec<u8>>, released: Option<Arc<AtomicUsize>>) -> ByteStream {
    struct Guard(Option<Arc<AtomicUsize>>);
    impl Drop for Guard {
        fn drop(&mut self) {
            if let Some(counter) = &self.0 {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    let guard = Guard(released);
    Box::pin(futures::stream::iter(chunks).map(move |chunk| {
        let _held = &guard;
        Ok::<_, ProviderError>(chunk)
    }))
}

fn chunks(parts: &[&str]) -> Vec<Vec<u8>> {
    parts.iter().map(|p| p.as_bytes().to_vec()).collect()
}

async fn decode_all(parts: Vec<Vec<u8>>) -> Vec<PartialResponse> {
    PartialResponseStream::new(body(parts, None))
        .map(|r| r.unwrap())
        .collect()
        .await
}

fn delta(text: &str) -> String {
    format!(
        "data: {}\n",
        serde_json::json!({"choices": [{"delta": {"content": text}}]})
    )
}

const HI_THEN_DONE: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\ndata: [DONE]\n";

// -- SseDecoder --

#[test]
fn test_feed_single_frame() {
    let mut decoder = SseDecoder::new();
    let decoded = decoder.feed(HI_THEN_DONE.as_bytes());

    assert_eq!(
        decoded.responses,
        vec![PartialResponse {
            text_delta: "Hi".to_string(),
            finish_reason: None,
        }]
    );
    assert!(decoded.done);
    assert!(decoder.is_done());
}

#[test]
fn test_feed_keeps_partial_line() {
    let mut decoder = SseDecoder::new();

    let first = decoder.feed(b"data: {\"choices\":[{\"delta\":");
    assert!(first.responses.is_empty());
    assert!(!first.done);

    let second = decoder.feed(b"{\"content\":\"Hi\"}}]}\n");
    assert_eq!(second.responses.len(), 1);
    assert_eq!(second.responses[0].text_delta, "Hi");
}

#[test]
fn test_feed_unterminated_line_is_not_processed() {
    let mut decoder = SseDecoder::new();
    let decoded = decoder.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}");
    assert!(decoded.responses.is_empty());
}

#[test]
fn test_feed_malformed_frame_is_skipped() {
    let mut decoder = SseDecoder::new();
    let input = format!("data: not-json\n{}", delta("after"));
    let decoded = decoder.feed(input.as_bytes());

    assert_eq!(decoded.responses.len(), 1);
    assert_eq!(decoded.responses[0].text_delta, "after");
    assert!(!decoded.done);
}

#[test]
fn test_feed_empty_and_absent_delta_emit_nothing() {
    let mut decoder = SseDecoder::new();
    let input = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n",
        "data: {\"choices\":[{\"delta\":{\"content\":null}}]}\n",
        "data: {\"choices\":[]}\n",
        "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n",
        "data: {}\n",
    );
    let decoded = decoder.feed(input.as_bytes());

    assert!(decoded.responses.is_empty());
    assert!(!decoded.done);
}

#[test]
fn test_feed_ignores_non_data_lines() {
    let mut decoder = SseDecoder::new();
    let input = format!(
        ": keep-alive\nevent: message\nid: 7\nretry: 100\ndata:{}\n{}",
        "{\"choices\":[{\"delta\":{\"content\":\"nospace\"}}]}",
        delta("ok")
    );
    let decoded = decoder.feed(input.as_bytes());

    assert_eq!(decoded.responses.len(), 1);
    assert_eq!(decoded.responses[0].text_delta, "ok");
}

#[test]
fn test_feed_trims_whitespace_and_crlf() {
    let mut decoder = SseDecoder::new();
    let input = "  data: {\"choices\":[{\"delta\":{\"content\":\" padded \"}}]}\r\n\r\n  data: [DONE]\r\n";
    let decoded = decoder.feed(input.as_bytes());

    assert_eq!(decoded.responses.len(), 1);
    // Only the line is trimmed, never the delta text.
    assert_eq!(decoded.responses[0].text_delta, " padded ");
    assert!(decoded.done);
}

#[test]
fn test_feed_sentinel_requires_exact_match() {
    let mut decoder = SseDecoder::new();
    let decoded = decoder.feed(b"data: [DONE] trailing\ndata:  [DONE]\ndata:[DONE]\n");
    assert!(!decoded.done);
    assert!(decoded.responses.is_empty());
}

#[test]
fn test_feed_stops_at_sentinel() {
    let mut decoder = SseDecoder::new();
    let input = format!("{}data: [DONE]\n{}", delta("before"), delta("after"));
    let decoded = decoder.feed(input.as_bytes());

    assert_eq!(decoded.responses.len(), 1);
    assert_eq!(decoded.responses[0].text_delta, "before");
    assert!(decoded.done);

    let later = decoder.feed(delta("later").as_bytes());
    assert!(later.responses.is_empty());
    assert!(later.done);
}

#[test]
fn test_feed_finish_reason() {
    let mut decoder = SseDecoder::new();
    let decoded = decoder
        .feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"!\"},\"finish_reason\":\"length\"}]}\n");

    assert_eq!(
        decoded.responses[0].finish_reason,
        Some("length".to_string())
    );
}

#[test]
fn test_feed_off_type_finish_reason_keeps_delta() {
    let mut decoder = SseDecoder::new();
    let decoded =
        decoder.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"},\"finish_reason\":0}]}\n");

    assert_eq!(
        decoded.responses,
        vec![PartialResponse {
            text_delta: "Hi".to_string(),
            finish_reason: None,
        }]
    );
}

#[test]
fn test_feed_malformed_extra_choice_keeps_first() {
    let mut decoder = SseDecoder::new();
    let decoded = decoder.feed(
        b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}},null,{\"delta\":7}]}\n",
    );

    assert_eq!(decoded.responses.len(), 1);
    assert_eq!(decoded.responses[0].text_delta, "a");
}

#[test]
fn test_feed_off_type_delta_is_skipped() {
    let mut decoder = SseDecoder::new();
    let input = format!(
        "data: {{\"choices\":[{{\"delta\":\"oops\"}}]}}\n{}",
        delta("next")
    );
    let decoded = decoder.feed(input.as_bytes());

    assert_eq!(decoded.responses.len(), 1);
    assert_eq!(decoded.responses[0].text_delta, "next");
}

#[test]
fn test_feed_only_first_choice() {
    let mut decoder = SseDecoder::new();
    let decoded = decoder.feed(
        b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}},{\"delta\":{\"content\":\"b\"}}]}\n",
    );

    assert_eq!(decoded.responses.len(), 1);
    assert_eq!(decoded.responses[0].text_delta, "a");
}

#[test]
fn test_feed_multibyte_split_across_chunks() {
    let line = delta("héllo 🦀");
    let bytes = line.as_bytes();
    // Split inside the 4-byte crab.
    let crab_start = line.find('🦀').unwrap();
    let (a, b) = bytes.split_at(crab_start + 2);

    let mut decoder = SseDecoder::new();
    assert!(decoder.feed(a).responses.is_empty());
    let decoded = decoder.feed(b);

    assert_eq!(decoded.responses[0].text_delta, "héllo 🦀");
}

#[test]
fn test_feed_invalid_utf8_is_replaced() {
    let mut decoder = SseDecoder::new();
    let mut input = b"data: {\"choices\":[{\"delta\":{\"content\":\"a".to_vec();
    input.push(0xFF);
    input.extend_from_slice(b"b\"}}]}\n");

    let decoded = decoder.feed(&input);
    assert_eq!(decoded.responses[0].text_delta, "a\u{FFFD}b");
}

#[test]
fn test_parse_line_reports_frame_error() {
    let result = parse_line("data: {broken");
    assert!(matches!(result, Err(FrameError::Malformed(_))));
}

#[test]
fn test_frame_error_display() {
    let err = parse_line("data: nope").unwrap_err();
    assert!(err.to_string().starts_with("malformed SSE frame"));
}

// -- PartialResponseStream --

#[tokio::test]
async fn test_stream_hi_then_done() {
    let responses = decode_all(chunks(&[HI_THEN_DONE])).await;

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].text_delta, "Hi");
    assert!(responses[0].finish_reason.is_none());
}

#[tokio::test]
async fn test_stream_chunk_boundary_independence() {
    let wire = format!(
        "{}\n{}data: not-json\n{}data: [DONE]\n",
        delta("Hello"),
        delta(", wörld"),
        delta("!")
    );
    let expected = decode_all(vec![wire.as_bytes().to_vec()]).await;
    assert_eq!(expected.len(), 3);

    for size in [1, 2, 3, 5, 7, 16, 64] {
        let split: Vec<Vec<u8>> = wire.as_bytes().chunks(size).map(<[u8]>::to_vec).collect();
        let actual = decode_all(split).await;
        assert_eq!(actual, expected, "chunk size {}", size);
    }
}

#[tokio::test]
async fn test_stream_malformed_line_does_not_terminate() {
    let responses = decode_all(chunks(&[
        "data: not-json\n",
        &delta("still here"),
        "data: [DONE]\n",
    ]))
    .await;

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].text_delta, "still here");
}

#[tokio::test]
async fn test_stream_without_sentinel_ends_on_body_end() {
    let responses = decode_all(chunks(&[&delta("a"), &delta("b")])).await;
    let texts: Vec<&str> = responses.iter().map(|r| r.text_delta.as_str()).collect();
    assert_eq!(texts, vec!["a", "b"]);
}

#[tokio::test]
async fn test_stream_discards_trailing_partial_line() {
    let responses = decode_all(chunks(&[
        &delta("kept"),
        "data: {\"choices\":[{\"delta\":{\"content\":\"lost\"}}]}",
    ]))
    .await;

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].text_delta, "kept");
}

#[tokio::test]
async fn test_stream_empty_body() {
    let responses = decode_all(Vec::new()).await;
    assert!(responses.is_empty());
}

#[tokio::test]
async fn test_stream_releases_body_on_sentinel() {
    let released = Arc::new(AtomicUsize::new(0));
    let mut stream = PartialResponseStream::new(body(
        chunks(&[HI_THEN_DONE, &delta("never read")]),
        Some(released.clone()),
    ));

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.text_delta, "Hi");
    // Released as soon as the sentinel is decoded, before the next poll.
    assert_eq!(released.load(Ordering::SeqCst), 1);

    assert!(stream.next().await.is_none());
    assert!(stream.is_terminated());
    drop(stream);
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stream_releases_body_on_end() {
    let released = Arc::new(AtomicUsize::new(0));
    let mut stream =
        PartialResponseStream::new(body(chunks(&[&delta("x")]), Some(released.clone())));

    assert!(stream.next().await.is_some());
    assert!(stream.next().await.is_none());
    assert_eq!(released.load(Ordering::SeqCst), 1);

    // Polling again after termination stays terminal.
    assert!(stream.next().await.is_none());
    drop(stream);
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stream_releases_body_on_early_drop() {
    let released = Arc::new(AtomicUsize::new(0));
    let mut stream = PartialResponseStream::new(body(
        chunks(&[&delta("one"), &delta("two"), "data: [DONE]\n"]),
        Some(released.clone()),
    ));

    assert_eq!(stream.next().await.unwrap().unwrap().text_delta, "one");
    assert_eq!(released.load(Ordering::SeqCst), 0);

    drop(stream);
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stream_transport_error_is_terminal() {
    let failing: ByteStream = Box::pin(futures::stream::iter(vec![
        Ok(delta("before").into_bytes()),
        Err(ProviderError::RequestFailed("connection reset".to_string())),
        Ok(delta("after").into_bytes()),
    ]));
    let mut stream = PartialResponseStream::new(failing);

    assert_eq!(stream.next().await.unwrap().unwrap().text_delta, "before");
    assert!(matches!(
        stream.next().await,
        Some(Err(ProviderError::RequestFailed(_)))
    ));
    assert!(stream.next().await.is_none());
    assert!(stream.is_terminated());
}

#[tokio::test]
async fn test_independent_streams_do_not_share_state() {
    let mut a = PartialResponseStream::new(body(
        chunks(&["data: {\"choices\":[{\"delta\":{\"content\":\"from-", "a\"}}]}\n"]),
        None,
    ));
    let mut b = PartialResponseStream::new(body(chunks(&[&delta("b")]), None));

    assert_eq!(b.next().await.unwrap().unwrap().text_delta, "b");
    assert_eq!(a.next().await.unwrap().unwrap().text_delta, "from-a");
}

#[test]
fn test_partial_response_into_generate_content_response() {
    let response: GenerateContentResponse = PartialResponse {
        text_delta: "chunk".to_string(),
        finish_reason: Some("stop".to_string()),
    }
    .into();

    assert_eq!(response.text(), "chunk");
    assert_eq!(response.finish_reason(), Some("stop"));
    assert!(response.raw.is_none());
}
