//! Built-in demo account, used when no config file is given

use std::io::Cursor;
use std::sync::Arc;

use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};
use vimg_core::{Credentials, EncodedPicture, PictureHandle, VehicleRecord};
use vimg_refresh::MockConnector;

pub const DEMO_USERNAME: &str = "demo@example.com";

pub fn credentials() -> Credentials {
    Credentials::new(DEMO_USERNAME, "demo")
}

/// Mock account with two vehicles and generated pictures
pub fn connector() -> anyhow::Result<MockConnector> {
    let vehicles = vec![
        VehicleRecord {
            vin: "WVWZZZE1ZMP000001".to_string(),
            model: Some("ID.3".to_string()),
            nickname: Some("City car".to_string()),
            pictures: vec![
                ("car".to_string(), picture(640, 360, Rgb([0, 90, 160]))?),
                ("carWithBadge".to_string(), picture(640, 360, Rgb([0, 120, 200]))?),
                ("status".to_string(), picture(480, 480, Rgb([40, 160, 80]))?),
            ],
        },
        VehicleRecord {
            vin: "WVGZZZE2ZNP000002".to_string(),
            model: Some("ID. Buzz".to_string()),
            nickname: None,
            pictures: vec![("car".to_string(), picture(800, 450, Rgb([230, 170, 0]))?)],
        },
    ];
    Ok(MockConnector::new(vehicles))
}

/// Vertical gradient over a base colour
fn picture(width: u32, height: u32, base: Rgb<u8>) -> anyhow::Result<PictureHandle> {
    let img: RgbImage = ImageBuffer::from_fn(width, height, |_, y| {
        let shade = (y * 96 / height.max(1)) as u8;
        Rgb([
            base[0].saturating_add(shade),
            base[1].saturating_add(shade),
            base[2].saturating_add(shade),
        ])
    });

    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(Arc::new(EncodedPicture::new(buffer.into_inner())))
}
