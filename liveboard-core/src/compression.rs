//! Payload size gate and per-segment compression.
//!
//! The platform rejects static activity attributes above a fixed size. The
//! gate measures the serialized layout, island, and behavior segments (plus
//! the data dictionary sent in the same call) and, when the total is over
//! the ceiling, compresses each segment on its own:
//!
//! ```text
//! raw JSON ──deflate──▶ bytes ──base64──▶ "__COMPRESSED__:" + text
//! ```
//!
//! The sentinel lets a decoder tell compressed segments from raw JSON with
//! no side channel. Failure handling is asymmetric: the layout segment is
//! required, so failing to compress it is an error; the island and behavior
//! segments fall back to their raw form with a warning.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::write::DeflateEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use serde::de::DeserializeOwned;

use crate::behavior::Behavior;
use crate::error::{CompressionError, DecodeError};
use crate::island::DynamicIslandLayout;
use crate::layout::LayoutElement;

/// Prefix marking a compressed, base64-encoded segment.
pub const COMPRESSED_SENTINEL: &str = "__COMPRESSED__:";

/// Default platform payload ceiling in bytes.
pub const DEFAULT_CEILING_BYTES: usize = 3000;

/// Default initial inflate buffer, as a multiple of the compressed size.
pub const DEFAULT_DECOMPRESSION_MULTIPLIER: usize = 8;

/// Default hard cap on inflated output, in bytes.
pub const DEFAULT_MAX_DECOMPRESSED_BYTES: usize = 1024 * 1024;

/// Smallest inflate buffer tried.
const MIN_INFLATE_CAPACITY: usize = 64;

/// Gate tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    /// Total payload size above which segments are compressed.
    pub ceiling_bytes: usize,
    /// First inflate buffer is `compressed_len * decompression_multiplier`.
    pub decompression_multiplier: usize,
    /// Inflate buffers grow by doubling up to this size.
    pub max_decompressed_bytes: usize,
    /// DEFLATE level, 0-9.
    pub compression_level: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            ceiling_bytes: DEFAULT_CEILING_BYTES,
            decompression_multiplier: DEFAULT_DECOMPRESSION_MULTIPLIER,
            max_decompressed_bytes: DEFAULT_MAX_DECOMPRESSED_BYTES,
            compression_level: Compression::best().level(),
        }
    }
}

/// The three static segments of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// Lock screen layout. Required.
    Layout,
    /// Island presentations.
    DynamicIsland,
    /// Behavior settings.
    Behavior,
}

impl SegmentKind {
    /// Whether a failure on this segment must fail the operation.
    #[must_use]
    pub const fn is_primary(self) -> bool {
        matches!(self, Self::Layout)
    }

    /// Name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Layout => "layout",
            Self::DynamicIsland => "dynamic_island",
            Self::Behavior => "behavior",
        }
    }
}

/// Serialized JSON for each static segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentSet {
    /// Layout JSON.
    pub layout: String,
    /// Dynamic island JSON.
    pub dynamic_island: String,
    /// Behavior JSON.
    pub behavior: String,
}

impl SegmentSet {
    /// Serialize each part independently.
    ///
    /// # Errors
    ///
    /// Returns an error if any part fails to serialize.
    pub fn from_parts(
        layout: &LayoutElement,
        dynamic_island: &DynamicIslandLayout,
        behavior: &Behavior,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            layout: serde_json::to_string(layout)?,
            dynamic_island: serde_json::to_string(dynamic_island)?,
            behavior: serde_json::to_string(behavior)?,
        })
    }
}

/// Measured sizes in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentSizes {
    /// Layout segment.
    pub layout: usize,
    /// Island segment.
    pub dynamic_island: usize,
    /// Behavior segment.
    pub behavior: usize,
    /// Data dictionary sent in the same call.
    pub data: usize,
    /// Sum of all of the above.
    pub total: usize,
}

/// Why the gate decided the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    /// Total fits under the ceiling; segments go out raw.
    WithinCeiling,
    /// Total exceeds the ceiling; segments are compressed.
    ExceedsCeiling,
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WithinCeiling => f.write_str("payload within ceiling"),
            Self::ExceedsCeiling => f.write_str("payload exceeds ceiling"),
        }
    }
}

/// Outcome of [`CompressionGate::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether segments should be compressed.
    pub compress: bool,
    /// Why.
    pub reason: DecisionReason,
    /// What was measured.
    pub sizes: SegmentSizes,
}

/// Segments ready for the platform call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSegments {
    /// Layout, raw or sentinel-prefixed.
    pub layout: String,
    /// Island, raw or sentinel-prefixed.
    pub dynamic_island: String,
    /// Behavior, raw or sentinel-prefixed.
    pub behavior: String,
    /// The gate decision that produced these.
    pub decision: Decision,
    /// Secondary segments that failed to compress and were sent raw.
    pub fallbacks: Vec<SegmentKind>,
}

impl EncodedSegments {
    /// Combined length of the three encoded segments.
    #[must_use]
    pub fn total_len(&self) -> usize {
        self.layout.len() + self.dynamic_island.len() + self.behavior.len()
    }
}

/// Result of a single bounded inflate attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inflated {
    /// The stream ended within the buffer.
    Complete(Vec<u8>),
    /// The buffer filled before the stream ended.
    OutputFull,
}

/// Byte-level codec used by the gate.
pub trait SegmentCodec: Send + Sync + fmt::Debug {
    /// Compress `input`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the encoder fails.
    fn compress(&self, input: &[u8]) -> std::io::Result<Vec<u8>>;

    /// Inflate `input` into a buffer of at most `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Corrupt`] for invalid or truncated streams.
    fn inflate(&self, input: &[u8], capacity: usize) -> Result<Inflated, DecodeError>;
}

/// Raw DEFLATE (no zlib header).
#[derive(Debug, Clone, Copy)]
pub struct DeflateCodec {
    level: Compression,
}

impl DeflateCodec {
    /// Codec at the given level (0-9).
    #[must_use]
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self {
            level: Compression::best(),
        }
    }
}

impl SegmentCodec for DeflateCodec {
    fn compress(&self, input: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(Vec::with_capacity(input.len() / 2), self.level);
        encoder.write_all(input)?;
        encoder.finish()
    }

    fn inflate(&self, input: &[u8], capacity: usize) -> Result<Inflated, DecodeError> {
        let mut inflater = Decompress::new(false);
        let mut out = Vec::with_capacity(capacity);
        let status = inflater
            .decompress_vec(input, &mut out, FlushDecompress::Finish)
            .map_err(|e| DecodeError::Corrupt(e.to_string()))?;
        match status {
            Status::StreamEnd => Ok(Inflated::Complete(out)),
            Status::Ok | Status::BufError if out.len() == out.capacity() => {
                Ok(Inflated::OutputFull)
            }
            Status::Ok | Status::BufError => Err(DecodeError::Corrupt(
                "compressed stream ended early".to_string(),
            )),
        }
    }
}

/// Measures, compresses, and decodes activity segments.
#[derive(Debug, Clone)]
pub struct CompressionGate {
    config: GateConfig,
    codec: Arc<dyn SegmentCodec>,
}

impl Default for CompressionGate {
    fn default() -> Self {
        Self::new(GateConfig::default())
    }
}

impl CompressionGate {
    /// Gate using raw DEFLATE.
    #[must_use]
    pub fn new(config: GateConfig) -> Self {
        let codec = DeflateCodec::new(config.compression_level);
        Self::with_codec(config, Arc::new(codec))
    }

    /// Gate using a custom codec.
    #[must_use]
    pub fn with_codec(config: GateConfig, codec: Arc<dyn SegmentCodec>) -> Self {
        Self { config, codec }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Measure `segments` plus `data_bytes` against the ceiling.
    #[must_use]
    pub fn decide(&self, segments: &SegmentSet, data_bytes: usize) -> Decision {
        let sizes = SegmentSizes {
            layout: segments.layout.len(),
            dynamic_island: segments.dynamic_island.len(),
            behavior: segments.behavior.len(),
            data: data_bytes,
            total: segments.layout.len()
                + segments.dynamic_island.len()
                + segments.behavior.len()
                + data_bytes,
        };
        let compress = sizes.total > self.config.ceiling_bytes;
        let reason = if compress {
            DecisionReason::ExceedsCeiling
        } else {
            DecisionReason::WithinCeiling
        };
        tracing::debug!(
            total = sizes.total,
            ceiling = self.config.ceiling_bytes,
            compress,
            "Payload gate: {reason}"
        );
        Decision {
            compress,
            reason,
            sizes,
        }
    }

    /// Produce the segments to send to the platform.
    ///
    /// # Errors
    ///
    /// Returns [`CompressionError::PrimarySegment`] if the layout must be
    /// compressed and compression fails. Secondary failures never error.
    pub fn encode(
        &self,
        segments: &SegmentSet,
        data_bytes: usize,
    ) -> Result<EncodedSegments, CompressionError> {
        let decision = self.decide(segments, data_bytes);
        if !decision.compress {
            return Ok(EncodedSegments {
                layout: segments.layout.clone(),
                dynamic_island: segments.dynamic_island.clone(),
                behavior: segments.behavior.clone(),
                decision,
                fallbacks: Vec::new(),
            });
        }

        let layout = self
            .encode_segment(&segments.layout)
            .map_err(CompressionError::PrimarySegment)?;
        let mut fallbacks = Vec::new();
        let dynamic_island = self.encode_secondary(
            SegmentKind::DynamicIsland,
            &segments.dynamic_island,
            &mut fallbacks,
        );
        let behavior =
            self.encode_secondary(SegmentKind::Behavior, &segments.behavior, &mut fallbacks);

        let encoded = EncodedSegments {
            layout,
            dynamic_island,
            behavior,
            decision,
            fallbacks,
        };
        let encoded_total = encoded.total_len() + data_bytes;
        if encoded_total > self.config.ceiling_bytes {
            tracing::warn!(
                original = decision.sizes.total,
                encoded = encoded_total,
                ceiling = self.config.ceiling_bytes,
                "Payload still exceeds ceiling after compression"
            );
        } else {
            tracing::debug!(
                original = decision.sizes.total,
                encoded = encoded_total,
                "Compressed activity payload"
            );
        }
        Ok(encoded)
    }

    fn encode_secondary(
        &self,
        kind: SegmentKind,
        raw: &str,
        fallbacks: &mut Vec<SegmentKind>,
    ) -> String {
        match self.encode_segment(raw) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!(
                    segment = kind.as_str(),
                    "Compression failed, sending segment uncompressed: {e}"
                );
                fallbacks.push(kind);
                raw.to_string()
            }
        }
    }

    /// Compress one segment and wrap it with the sentinel.
    ///
    /// # Errors
    ///
    /// Returns the codec's I/O error.
    pub fn encode_segment(&self, raw: &str) -> std::io::Result<String> {
        let compressed = self.codec.compress(raw.as_bytes())?;
        Ok(format!("{COMPRESSED_SENTINEL}{}", BASE64.encode(compressed)))
    }

    /// Decode a segment that may or may not carry the sentinel.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] for bad base64, corrupt or oversized
    /// streams, or output that is not UTF-8.
    pub fn decode(&self, segment: &str) -> Result<String, DecodeError> {
        let Some(body) = segment.strip_prefix(COMPRESSED_SENTINEL) else {
            return Ok(segment.to_string());
        };
        let compressed = BASE64.decode(body.trim())?;
        let bytes = self.decompress(&compressed)?;
        String::from_utf8(bytes)
            .map_err(|e| DecodeError::Corrupt(format!("decompressed payload is not UTF-8: {e}")))
    }

    /// Decode a segment and deserialize it.
    ///
    /// # Errors
    ///
    /// As [`CompressionGate::decode`], plus [`DecodeError::Json`].
    pub fn decode_json<T: DeserializeOwned>(&self, segment: &str) -> Result<T, DecodeError> {
        let json = self.decode(segment)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Inflate raw compressed bytes.
    ///
    /// The first buffer is `compressed.len() * decompression_multiplier`.
    /// When the output fills it before the stream ends, the buffer doubles
    /// and inflation restarts, up to `max_decompressed_bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::TooLarge`] past the cap, or
    /// [`DecodeError::Corrupt`] for invalid streams.
    pub fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>, DecodeError> {
        let limit = self.config.max_decompressed_bytes;
        let mut capacity = compressed
            .len()
            .saturating_mul(self.config.decompression_multiplier.max(1))
            .max(MIN_INFLATE_CAPACITY)
            .min(limit);

        loop {
            match self.codec.inflate(compressed, capacity)? {
                Inflated::Complete(out) => return Ok(out),
                Inflated::OutputFull => {
                    if capacity >= limit {
                        return Err(DecodeError::TooLarge { limit });
                    }
                    let next = capacity.saturating_mul(2).min(limit);
                    tracing::debug!(
                        from = capacity,
                        to = next,
                        "Inflate buffer full, retrying with a larger buffer"
                    );
                    capacity = next;
                }
            }
        }
    }
}

/// Whether `segment` carries the compression sentinel.
#[must_use]
pub fn is_compressed(segment: &str) -> bool {
    segment.starts_with(COMPRESSED_SENTINEL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    /// Codec that fails to compress any input containing `FAIL`.
    #[derive(Debug)]
    struct FailingCodec;

    impl SegmentCodec for FailingCodec {
        fn compress(&self, input: &[u8]) -> std::io::Result<Vec<u8>> {
            if input.windows(4).any(|w| w == b"FAIL") {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "injected"));
            }
            DeflateCodec::default().compress(input)
        }

        fn inflate(&self, input: &[u8], capacity: usize) -> Result<Inflated, DecodeError> {
            DeflateCodec::default().inflate(input, capacity)
        }
    }

    fn segments(text: &str, widget_url: &str) -> SegmentSet {
        SegmentSet::from_parts(
            &LayoutElement::text("root", text),
            &DynamicIslandLayout::with_center(LayoutElement::text("c", "Hi")),
            &Behavior::new(widget_url),
        )
        .expect("serialize")
    }

    fn big_text(len: usize) -> String {
        (0..len).map(|i| char::from(b'a' + (i % 26) as u8)).collect()
    }

    fn tight_gate() -> CompressionGate {
        CompressionGate::new(GateConfig {
            ceiling_bytes: 100,
            ..GateConfig::default()
        })
    }

    #[test]
    fn test_small_payload_is_not_compressed() {
        let gate = CompressionGate::default();
        let set = segments("Hello", "myapp://x");

        let encoded = gate.encode(&set, 10).expect("encode");

        assert!(!encoded.decision.compress);
        assert_eq!(encoded.decision.reason, DecisionReason::WithinCeiling);
        assert_eq!(encoded.layout, set.layout);
        assert_eq!(encoded.dynamic_island, set.dynamic_island);
        assert_eq!(encoded.behavior, set.behavior);
    }

    #[test]
    fn test_data_bytes_count_toward_total() {
        let gate = tight_gate();
        let set = SegmentSet {
            layout: "{}".to_string(),
            dynamic_island: "{}".to_string(),
            behavior: "{}".to_string(),
        };

        assert!(!gate.decide(&set, 94).compress);
        let decision = gate.decide(&set, 95);
        assert!(decision.compress);
        assert_eq!(decision.sizes.total, 101);
        assert_eq!(decision.sizes.data, 95);
    }

    #[test]
    fn test_large_payload_compresses_every_segment() {
        let gate = tight_gate();
        let set = segments(&big_text(500), "myapp://x");

        let encoded = gate.encode(&set, 0).expect("encode");

        assert!(encoded.decision.compress);
        assert_eq!(encoded.decision.reason, DecisionReason::ExceedsCeiling);
        assert!(is_compressed(&encoded.layout));
        assert!(is_compressed(&encoded.dynamic_island));
        assert!(is_compressed(&encoded.behavior));
        assert!(encoded.fallbacks.is_empty());

        assert_eq!(gate.decode(&encoded.layout).expect("layout"), set.layout);
        assert_eq!(
            gate.decode(&encoded.dynamic_island).expect("island"),
            set.dynamic_island
        );
        assert_eq!(gate.decode(&encoded.behavior).expect("behavior"), set.behavior);
    }

    #[test]
    fn test_secondary_failure_falls_back_to_raw() {
        let gate = CompressionGate::with_codec(
            GateConfig {
                ceiling_bytes: 100,
                ..GateConfig::default()
            },
            Arc::new(FailingCodec),
        );
        let set = segments(&big_text(500), "myapp://FAIL");

        let encoded = gate.encode(&set, 0).expect("secondary failures are not fatal");

        assert!(is_compressed(&encoded.layout));
        assert!(is_compressed(&encoded.dynamic_island));
        assert_eq!(encoded.behavior, set.behavior);
        assert_eq!(encoded.fallbacks, vec![SegmentKind::Behavior]);
    }

    #[test]
    fn test_primary_failure_is_fatal() {
        let gate = CompressionGate::with_codec(
            GateConfig {
                ceiling_bytes: 100,
                ..GateConfig::default()
            },
            Arc::new(FailingCodec),
        );
        let set = segments(&format!("FAIL{}", big_text(500)), "myapp://x");

        let result = gate.encode(&set, 0);

        assert!(matches!(result, Err(CompressionError::PrimarySegment(_))));
    }

    #[test]
    fn test_decode_passes_raw_segments_through() {
        let gate = CompressionGate::default();
        let raw = r#"{"id":"a","kind":"text"}"#;
        assert_eq!(gate.decode(raw).expect("decode"), raw);
    }

    #[test]
    fn test_decompress_grows_past_multiplier() {
        let gate = CompressionGate::new(GateConfig {
            decompression_multiplier: 1,
            ..GateConfig::default()
        });
        // Highly repetitive input expands far beyond 1x its compressed size.
        let raw = "x".repeat(200_000);

        let encoded = gate.encode_segment(&raw).expect("compress");
        let decoded = gate.decode(&encoded).expect("decode");

        assert_eq!(decoded.len(), raw.len());
        assert_eq!(decoded, raw);
    }

    #[test]
    fn test_decompress_rejects_output_over_cap() {
        let gate = CompressionGate::new(GateConfig {
            max_decompressed_bytes: 4096,
            ..GateConfig::default()
        });
        let encoded = gate.encode_segment(&"y".repeat(10_000)).expect("compress");

        let result = gate.decode(&encoded);

        assert!(matches!(result, Err(DecodeError::TooLarge { limit: 4096 })));
    }

    #[test]
    fn test_invalid_base64_fails() {
        let gate = CompressionGate::default();
        let result = gate.decode(&format!("{COMPRESSED_SENTINEL}not*base64!"));
        assert!(matches!(result, Err(DecodeError::Base64(_))));
    }

    #[test]
    fn test_truncated_stream_fails() {
        let gate = CompressionGate::default();
        let compressed = DeflateCodec::default()
            .compress(big_text(5000).as_bytes())
            .expect("compress");
        let truncated = &compressed[..compressed.len() / 2];

        let result = gate.decompress(truncated);

        assert!(matches!(result, Err(DecodeError::Corrupt(_))));
    }

    #[test]
    fn test_decode_json_layout() {
        let gate = tight_gate();
        let layout = LayoutElement::text("t", "{{eta}}").with_property("padding", 4);
        let set = SegmentSet::from_parts(
            &layout,
            &DynamicIslandLayout::default(),
            &Behavior::new("myapp://x"),
        )
        .expect("serialize");
        let encoded = gate.encode(&set, 200).expect("encode");

        let decoded: LayoutElement = gate.decode_json(&encoded.layout).expect("decode");

        assert_eq!(decoded, layout);
        assert_eq!(decoded.property("padding"), Some(&Value::Number(4.0)));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_segment_roundtrip(raw in ".{0,4000}") {
                let gate = CompressionGate::default();
                let encoded = gate.encode_segment(&raw).expect("compress");
                prop_assert!(is_compressed(&encoded));
                prop_assert_eq!(gate.decode(&encoded).expect("decode"), raw);
            }

            #[test]
            fn prop_bytes_roundtrip(bytes in proptest::collection::vec(any::<u8>(), 0..8192)) {
                let gate = CompressionGate::default();
                let compressed = DeflateCodec::default().compress(&bytes).expect("compress");
                prop_assert_eq!(gate.decompress(&compressed).expect("decompress"), bytes);
            }
        }
    }
}
