//! Build script checking that the system OpenCV provides the modules the
//! tracker links against.

use std::process::Command;

/// OpenCV libraries used by the detector and the video adapters
const REQUIRED_MODULES: [&str; 3] = ["opencv_core", "opencv_imgproc", "opencv_videoio"];

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=PKG_CONFIG_PATH");
    println!("cargo:rerun-if-env-changed=OPENCV_LINK_LIBS");

    match opencv_libs() {
        Some(libs) => {
            for module in REQUIRED_MODULES {
                if !libs.split_whitespace().any(|flag| flag == format!("-l{module}")) {
                    println!("cargo:warning=OpenCV is missing {module}; frame decoding or detection will fail to link");
                }
            }
        }
        None => {
            println!("cargo:warning=OpenCV not found via pkg-config; set OPENCV_LINK_LIBS or install the development files");
            println!("cargo:warning=On Ubuntu: sudo apt-get install libopencv-dev");
            println!("cargo:warning=On macOS: brew install opencv");
        }
    }
}

/// `pkg-config --libs` output for opencv4, falling back to opencv
fn opencv_libs() -> Option<String> {
    ["opencv4", "opencv"].iter().find_map(|package| {
        let output = Command::new("pkg-config").args(["--libs", package]).output().ok()?;
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).into_owned())
    })
}
