fn main() -> Result<(), Box<dyn std::error::Error>> {
    // protoc is not assumed to be on PATH; point prost-build at the vendored binary.
    if std::env::var_os("PROTOC").is_none() {
        if let Ok(protoc) = protoc_bin_vendored::protoc_bin_path() {
            std::env::set_var("PROTOC", protoc);
        }
    }
    tonic_build::configure()
        .build_server(true)
        .compile(&["proto/offload.proto"], &["proto"])?;
    println!("cargo:rerun-if-changed=proto/offload.proto");
    Ok(())
}
