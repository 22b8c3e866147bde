#![no_main]

use bephookgen::{
    cache::ContentHash, hookgen::HookGenerator, metadata::image::AssemblyImage,
    publicizer::publicize, resolver::SearchDirectories,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(mut image) = AssemblyImage::from_mem(data.to_vec(), SearchDirectories::default()) else {
        return;
    };

    publicize(&mut image);
    let _ = image.to_bytes();
    let _ = HookGenerator::default().generate(
        &image,
        "MMHOOK_fuzz.dll",
        &ContentHash::of_bytes(data),
    );
});
