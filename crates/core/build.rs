// Build script for compiling the Mapbox Vector Tile protobuf definition

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }
    prost_build::compile_protos(&["proto/vector_tile.proto"], &["proto/"])?;
    Ok(())
}
