mod common;

use std::fs;

use common::{HashEngine, convert_str};
use smi2fps::{FingerprintSpec, Flavor, LineReader, StreamSelector, convert, open_input, open_output};

const INPUT: &str = "CCO ethanol\nc1ccccc1 benzene\nC1bad broken\nCC(=O)O\tacetic acid\n";

#[test]
fn repeated_runs_are_byte_identical() {
    let spec = FingerprintSpec::new(Flavor::Fcfp4, 512).unwrap();
    let first = convert_str(spec, INPUT);
    let second = convert_str(spec, INPUT);

    assert_eq!(first.output, second.output);
    assert_eq!(first.diagnostics, second.diagnostics);
}

#[test]
fn repeated_file_runs_are_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.smi");
    fs::write(&input, INPUT).unwrap();
    let spec = FingerprintSpec::new(Flavor::Ecfp4, 1024).unwrap();

    let mut outputs = Vec::new();
    for name in ["a.fps", "b.fps"] {
        let path = dir.path().join(name);
        let reader = open_input(&StreamSelector::Path(input.clone())).unwrap();
        let writer = open_output(&StreamSelector::Path(path.clone())).unwrap();
        let summary = convert(
            spec,
            LineReader::new(reader),
            writer,
            HashEngine::default(),
            "smi2fps-test",
            std::io::sink(),
        )
        .unwrap();
        assert_eq!(summary.encoded, 3);
        outputs.push(fs::read(&path).unwrap());
    }

    assert_eq!(outputs[0], outputs[1]);
    assert!(outputs[0].starts_with(b"#FPS1\n#num_bits=1024\n"));
}
