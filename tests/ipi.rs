use std::collections::BTreeSet;
use std::path::Path;

use protmap::ipi::IpiLookupTable;

#[test]
fn loads_the_bundled_mapping_file_format() {
    let table = IpiLookupTable::from_path(Path::new("tests/fixtures/last-UniProtKB2IPI.map"));

    assert_eq!(table.len(), 3);
    assert_eq!(
        table.lookup("IPI00000001"),
        BTreeSet::from(["P12345".to_string(), "Q99999".to_string()])
    );
    assert_eq!(
        table.lookup("IPI00019576"),
        BTreeSet::from(["P01308".to_string()])
    );
    assert!(table.lookup("IPI00000000").is_empty());
}
