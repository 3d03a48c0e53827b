use std::env;
use std::path::PathBuf;

/// Compiles `fake_clock_gettime.c` / `fake_gettimeofday.c` for the host
/// architecture into raw relocatable objects (not a static lib -- the
/// fake-image loader needs the `.rela.text` section intact, which a `.a`
/// archive member still carries but which an `ld -r` final-link step would
/// resolve away). We therefore call the compiler driver directly, the way
/// `preloader/build.rs` in the teacher tree drives `cc::Build` for its own
/// freestanding sources.
fn main() {
    let arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_else(|_| "x86_64".into());
    let arch_dir = match arch.as_str() {
        "aarch64" => "aarch64",
        "x86_64" => "x86_64",
        other => panic!("vdso-skew-fakeclock: unsupported target_arch {}", other),
    };
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));

    for name in ["fake_clock_gettime", "fake_gettimeofday"] {
        let src = PathBuf::from("src/c").join(arch_dir).join(format!("{}.c", name));
        let obj = out_dir.join(format!("{}_{}.o", name, arch_dir));

        let compiler = cc::Build::new().opt_level(2).get_compiler();
        let mut cmd = compiler.to_command();
        cmd.arg("-fPIC")
            .arg("-fno-stack-protector")
            .arg("-ffreestanding")
            .arg("-fno-asynchronous-unwind-tables")
            .arg("-c")
            .arg(&src)
            .arg("-o")
            .arg(&obj);

        let status = cmd.status().unwrap_or_else(|e| {
            panic!("failed to invoke C compiler on {}: {}", src.display(), e)
        });
        assert!(status.success(), "compiling {} failed", src.display());
        println!("cargo:rerun-if-changed={}", src.display());
    }

    println!("cargo:rustc-env=FAKE_IMAGE_ARCH={}", arch_dir);
}
