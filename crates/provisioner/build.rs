//! Build script for compiling the provisioner protobuf definitions.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::compile_protos("proto/provisioner.proto")?;
    println!("cargo:rerun-if-changed=proto/provisioner.proto");
    Ok(())
}
