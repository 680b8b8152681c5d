//! Fixtures shared by unit tests.

use std::{
    collections::HashMap,
    io::Cursor,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use elementkit_http::{CacheDirective, HttpClientTrait, HttpError, StatusCode};
use image::{DynamicImage, RgbaImage};
use parking_lot::Mutex;

/// Deterministic noise, so encoders cannot compress it away.
pub(crate) fn noisy_image(width: u32, height: u32) -> RgbaImage {
    let mut state: u32 = 0x9e37_79b9;
    RgbaImage::from_fn(width, height, |_, _| {
        let mut next = || {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 24) as u8
        };
        image::Rgba([next(), next(), next(), 255])
    })
}

pub(crate) fn noisy_png(width: u32, height: u32) -> Vec<u8> {
    encode(DynamicImage::ImageRgba8(noisy_image(width, height)), image::ImageFormat::Png)
}

pub(crate) fn noisy_jpeg(width: u32, height: u32) -> Vec<u8> {
    let rgb = DynamicImage::ImageRgba8(noisy_image(width, height)).to_rgb8();
    encode(DynamicImage::ImageRgb8(rgb), image::ImageFormat::Jpeg)
}

fn encode(img: DynamicImage, format: image::ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}

/// In-memory HTTP client that records every request.
#[derive(Default)]
pub(crate) struct MockHttp {
    responses: Mutex<HashMap<String, Bytes>>,
    requests: Mutex<Vec<(String, CacheDirective)>>,
    calls: AtomicUsize,
    latency: Option<Duration>,
}

impl MockHttp {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub(crate) fn respond(&self, url: &str, body: impl Into<Bytes>) {
        self.responses.lock().insert(url.to_string(), body.into());
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn directives(&self) -> Vec<CacheDirective> {
        self.requests.lock().iter().map(|(_, d)| *d).collect()
    }
}

#[async_trait]
impl HttpClientTrait for MockHttp {
    async fn get_bytes(&self, url: &str, directive: CacheDirective) -> elementkit_http::Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push((url.to_string(), directive));

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.responses
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| HttpError::HttpStatus {
                status: StatusCode::NOT_FOUND,
                message: "Not Found".to_string(),
            })
    }
}
