// Build script to compile GLSL shaders to SPIR-V
//
// Every .vert/.frag/.geom under shaders/src becomes <name>.spv under
// shaders/spirv, which is where the context looks for them at runtime.

use std::path::Path;
use std::process::Command;

const SOURCE_DIR: &str = "shaders/src";
const OUTPUT_DIR: &str = "shaders/spirv";

fn main() {
    println!("cargo:rerun-if-changed={}", SOURCE_DIR);

    let entries = match std::fs::read_dir(SOURCE_DIR) {
        Ok(entries) => entries,
        Err(e) => {
            println!("cargo:warning=No shader sources in {} ({})", SOURCE_DIR, e);
            return;
        }
    };

    let mut sources: Vec<_> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("vert" | "frag" | "geom")
            )
        })
        .collect();
    sources.sort();

    if let Err(e) = std::fs::create_dir_all(OUTPUT_DIR) {
        panic!("Failed to create {}: {}", OUTPUT_DIR, e);
    }

    for source in sources {
        let Some(file_name) = source.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let output = Path::new(OUTPUT_DIR).join(format!("{}.spv", file_name));
        compile_shader(&source, &output);
    }
}

fn compile_shader(input: &Path, output: &Path) {
    // Check if glslc is available
    let result = Command::new("glslc").arg(input).arg("-o").arg(output).status();

    match result {
        Ok(status) if status.success() => {
            println!("Compiled {} -> {}", input.display(), output.display());
        }
        Ok(status) => {
            panic!("Failed to compile {}: exit code {:?}", input.display(), status.code());
        }
        Err(e) => {
            println!("cargo:warning=glslc not found ({}); {} not compiled", e, input.display());
            println!(
                "cargo:warning=Install the Vulkan SDK or run: glslc {} -o {}",
                input.display(),
                output.display()
            );
        }
    }
}
