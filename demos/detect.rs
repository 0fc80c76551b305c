//! Run one detection against a local image.
//!
//! ```sh
//! GOOGLE_VISION_API_KEY=... cargo run --example detect -- safe_search photo.jpg
//! ```

use google_vision::{annotations, DetectionFeature, VisionClient, VisionSettings};
use tracing_subscriber::EnvFilter;

fn parse_feature(name: &str) -> Option<DetectionFeature> {
    Some(match name {
        "labels" => DetectionFeature::Label,
        "landmark" => DetectionFeature::Landmark,
        "logo" => DetectionFeature::Logo,
        "safe_search" => DetectionFeature::SafeSearch,
        "ocr" => DetectionFeature::Text,
        "faces" => DetectionFeature::Face,
        "properties" => DetectionFeature::ImageProperties,
        _ => return None,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(feature), Some(path)) = (args.next(), args.next()) else {
        eprintln!("usage: detect <labels|landmark|logo|safe_search|ocr|faces|properties> <image>");
        std::process::exit(2);
    };
    let feature = parse_feature(&feature).ok_or_else(|| format!("unknown feature: {feature}"))?;

    let settings = VisionSettings::default().with_env_override();
    let client = VisionClient::new(settings.to_config());

    match client.try_detect(feature, &path).await {
        Ok(doc) => {
            match feature {
                DetectionFeature::SafeSearch => {
                    if let Some(ss) = annotations::safe_search(&doc) {
                        println!("adult={} violence={} racy={}", ss.adult, ss.violence, ss.racy);
                    }
                }
                DetectionFeature::Label => {
                    println!("labels: {}", annotations::label_descriptions(&doc).join(", "));
                }
                DetectionFeature::ImageProperties => {
                    for color in annotations::dominant_colors(&doc) {
                        println!("{} ({:.2})", color.hex(), color.score);
                    }
                }
                _ => println!("{}", serde_json::to_string_pretty(&doc)?),
            }
        }
        Err(e) => eprintln!("no result ({}): {e}", e.kind()),
    }

    Ok(())
}
