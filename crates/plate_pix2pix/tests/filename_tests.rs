mod common;

#[cfg(test)]
mod filename_tests {
    use plate_pix2pix::plate_database::plate_filename::{
        ChannelLayout, PlateFileIndex, PlateFileName, PlateIndexError, PlateSite,
        normalize_extension,
    };
    use std::path::Path;

    use crate::common::{touch, unique_dir};

    #[test]
    fn test_file_name_follows_scanner_scheme() {
        let site = PlateSite::new("B02", 7);
        let name = PlateFileName::new(&site, 4, 3);
        assert_eq!(
            name.file_name(".tif"),
            "AssayPlate_Greiner_#655090_B02_T0001F007L01A04Z03C04.tif"
        );
        assert_eq!(name.file_name("tif"), name.file_name(".tif"));
        assert_eq!(normalize_extension("png"), ".png");
    }

    #[test]
    fn test_parse_file_name() {
        let parsed = PlateFileName::parse("AssayPlate_Greiner_#655090_D04_T0001F012L01A02Z01C02.tif")
            .expect("failed to parse file name");
        assert_eq!(parsed, PlateFileName::new(&PlateSite::new("D04", 12), 2, 1));
        assert_eq!(parsed.plate_site(), PlateSite::new("D04", 12));

        // action and channel have to agree
        assert!(PlateFileName::parse("AssayPlate_Greiner_#655090_D04_T0001F012L01A02Z01C03.tif").is_none());
        assert!(PlateFileName::parse("SomeOtherPlate_D04_T0001F012L01A02Z01C02.tif").is_none());
    }

    #[test]
    fn test_scan_keeps_first_occurrence_order() {
        let dir = unique_dir("scan_order");
        let c03 = PlateSite::new("C03", 1);
        let b02 = PlateSite::new("B02", 2);
        touch(&dir, &PlateFileName::new(&c03, 4, 1).file_name(".tif"));
        touch(&dir, &PlateFileName::new(&c03, 4, 2).file_name(".tif"));
        touch(&dir, &PlateFileName::new(&b02, 1, 1).file_name(".tif"));
        touch(&dir, &PlateFileName::new(&b02, 4, 1).file_name(".png"));
        touch(&dir, "README.md");
        // right well token, broken channel suffix
        touch(&dir, "AssayPlate_Greiner_#655090_D04_T0001F001L01A04Z01C02.tif");

        let index = PlateFileIndex::scan(&dir, ".tif").expect("failed to scan");
        assert_eq!(index.file_count(), 4);
        assert_eq!(index.channel_file_count(), 3);
        assert_eq!(
            index.wells(),
            &["B02".to_string(), "C03".to_string(), "D04".to_string()]
        );
        assert_eq!(index.dir(), dir.as_path());
        std::fs::remove_dir_all(&dir).expect("failed to remove test directory");
    }

    #[test]
    fn test_scan_without_matching_extension() {
        let dir = unique_dir("scan_no_files");
        touch(&dir, &PlateFileName::new(&PlateSite::new("B02", 1), 4, 1).file_name(".png"));
        let r = PlateFileIndex::scan(&dir, ".tif");
        assert!(matches!(r, Err(PlateIndexError::NoFilesFound { .. })), "{:?}", r);
        std::fs::remove_dir_all(&dir).expect("failed to remove test directory");
    }

    #[test]
    fn test_scan_without_wells() {
        let dir = unique_dir("scan_no_wells");
        touch(&dir, "calibration.tif");
        touch(&dir, "AssayPlate_Other_#1_B02_T0001F001L01A04Z01C04.tif");
        let r = PlateFileIndex::scan(&dir, ".tif");
        assert!(
            matches!(r, Err(PlateIndexError::NoWellsFound { files: 2, .. })),
            "{:?}",
            r
        );
        std::fs::remove_dir_all(&dir).expect("failed to remove test directory");
    }

    #[test]
    fn test_scan_missing_directory() {
        let r = PlateFileIndex::scan(Path::new("./does/not/exist"), ".tif");
        assert!(matches!(r, Err(PlateIndexError::InvalidPath { .. })), "{:?}", r);
    }

    #[test]
    fn test_layout_directories() {
        let root = Path::new("plate/60x images");
        assert_eq!(ChannelLayout::Flat.input_dir(root), root);
        assert_eq!(ChannelLayout::Flat.target_dir(root), root);
        assert_eq!(ChannelLayout::Separated.input_dir(root), root.join("input"));
        assert_eq!(ChannelLayout::Separated.target_dir(root), root.join("targets"));
    }
}
