use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use rust_htslib::bam::header::{Header, HeaderRecord};
use rust_htslib::bam::record::{Aux, Cigar, CigarString};
use rust_htslib::bam::{self, HeaderView, Read};
use tracing::debug;

use super::reference::ContigInfo;
use super::source::InMemoryAlignments;
use super::types::{AlignmentRecord, CigarOp, CigarOpKind, Strand};

/// Contig dictionary declared by a BAM header.
pub fn header_contigs(header: &HeaderView) -> Vec<ContigInfo> {
    (0..header.target_count())
        .map(|tid| ContigInfo {
            name: Arc::from(String::from_utf8_lossy(header.tid2name(tid)).as_ref()),
            len: header
                .target_len(tid)
                .and_then(|len| u32::try_from(len).ok())
                .unwrap_or(u32::MAX),
        })
        .collect()
}

/// Load every record of a BAM (or SAM/CRAM readable by htslib) in file order.
///
/// Ordering is not checked here; the traversal rejects unsorted input.
pub fn read_alignments<P: AsRef<Path>>(path: P) -> Result<(InMemoryAlignments, Vec<ContigInfo>)> {
    let path = path.as_ref();
    let mut reader = bam::Reader::from_path(path)
        .with_context(|| format!("failed to open alignments {}", path.display()))?;
    let header = reader.header().clone();
    let contigs = header_contigs(&header);

    let mut records = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("failed to decode record {}", idx + 1))?;
        records.push(convert_record(&record, &contigs));
    }
    debug!(path = %path.display(), records = records.len(), "alignments loaded");

    Ok((InMemoryAlignments::new(records), contigs))
}

/// SAM/BAM header declaring `contigs` as a coordinate-sorted dictionary.
pub fn sam_header(contigs: &[ContigInfo]) -> Header {
    let mut header = Header::new();

    let mut hd = HeaderRecord::new(b"HD");
    hd.push_tag(b"VN", &"1.6");
    hd.push_tag(b"SO", &"coordinate");
    header.push_record(&hd);

    for contig in contigs {
        let mut sq = HeaderRecord::new(b"SQ");
        sq.push_tag(b"SN", contig.name.as_ref());
        sq.push_tag(b"LN", &i64::from(contig.len));
        header.push_record(&sq);
    }

    let mut pg = HeaderRecord::new(b"PG");
    pg.push_tag(b"ID", &"locuswalk");
    pg.push_tag(b"PN", &"locuswalk");
    pg.push_tag(b"VN", &env!("CARGO_PKG_VERSION"));
    header.push_record(&pg);
    header
}

/// Encode a record for an htslib writer whose header lists contigs in the
/// order `tid` indexes. `None` places the record on no contig.
pub fn encode_record(read: &AlignmentRecord, tid: Option<usize>) -> Result<bam::Record> {
    let name: &str = if read.name.is_empty() { "*" } else { &read.name };
    if name.len() > 254 {
        bail!("read name '{name}' is longer than 254 bytes");
    }
    // htslib stores a missing quality string as 0xff bytes.
    let qualities: Vec<u8> = if read.qualities.len() == read.sequence.len() {
        read.qualities.to_vec()
    } else {
        vec![0xff; read.sequence.len()]
    };
    let cigar = CigarString(read.cigar.iter().map(|op| encode_cigar(*op)).collect());

    let mut record = bam::Record::new();
    record.set(name.as_bytes(), Some(&cigar), &read.sequence, &qualities);
    record.set_tid(tid.map_or(Ok(-1), i32::try_from)?);
    record.set_pos(i64::from(read.start) - 1);
    record.set_mapq(read.mapq);
    record.set_mtid(-1);
    record.set_mpos(-1);
    record.set_insert_size(0);

    let mut flags = 0u16;
    if read.unmapped {
        flags |= FLAG_UNMAPPED;
    }
    if read.is_reverse() {
        flags |= FLAG_REVERSE;
    }
    if read.secondary {
        flags |= FLAG_SECONDARY;
    }
    record.set_flags(flags);

    if let Some(nm) = read.edit_distance {
        record.push_aux(b"NM", Aux::U32(nm))?;
    }
    if let Some(group) = &read.read_group {
        record.push_aux(b"RG", Aux::String(group.as_ref()))?;
    }
    Ok(record)
}

const FLAG_UNMAPPED: u16 = 0x4;
const FLAG_REVERSE: u16 = 0x10;
const FLAG_SECONDARY: u16 = 0x100;

fn encode_cigar(op: CigarOp) -> Cigar {
    match op.kind {
        CigarOpKind::Match => Cigar::Match(op.len),
        CigarOpKind::Insertion => Cigar::Ins(op.len),
        CigarOpKind::Deletion => Cigar::Del(op.len),
        CigarOpKind::Skip => Cigar::RefSkip(op.len),
        CigarOpKind::SoftClip => Cigar::SoftClip(op.len),
        CigarOpKind::HardClip => Cigar::HardClip(op.len),
        CigarOpKind::SequenceMatch => Cigar::Equal(op.len),
        CigarOpKind::SequenceMismatch => Cigar::Diff(op.len),
    }
}

fn convert_record(record: &bam::Record, contigs: &[ContigInfo]) -> AlignmentRecord {
    let contig: Arc<str> = usize::try_from(record.tid())
        .ok()
        .and_then(|tid| contigs.get(tid))
        .map(|info| Arc::clone(&info.name))
        .unwrap_or_else(|| Arc::from("*"));
    // htslib positions are 0-based; 0 marks a record with no alignment start.
    let start = u32::try_from(record.pos() + 1).unwrap_or(0);
    let cigar = record.cigar().iter().filter_map(convert_cigar).collect();
    let strand = if record.is_reverse() {
        Strand::Reverse
    } else {
        Strand::Forward
    };
    // A missing quality string is stored as 0xff bytes.
    let qualities: Vec<u8> = match record.qual().first() {
        Some(0xff) => Vec::new(),
        _ => record.qual().to_vec(),
    };

    let mut read = AlignmentRecord::new(
        contig,
        start,
        cigar,
        record.seq().as_bytes(),
        qualities,
        strand,
    )
    .with_name(String::from_utf8_lossy(record.qname()).as_ref())
    .with_mapq(record.mapq())
    .with_unmapped(record.is_unmapped())
    .with_secondary(record.is_secondary());

    if let Some(nm) = edit_distance(record) {
        read = read.with_edit_distance(nm);
    }
    if let Ok(Aux::String(group)) = record.aux(b"RG") {
        read = read.with_read_group(group);
    }
    read
}

fn edit_distance(record: &bam::Record) -> Option<u32> {
    match record.aux(b"NM").ok()? {
        Aux::U8(v) => Some(u32::from(v)),
        Aux::U16(v) => Some(u32::from(v)),
        Aux::U32(v) => Some(v),
        Aux::I8(v) => u32::try_from(v).ok(),
        Aux::I16(v) => u32::try_from(v).ok(),
        Aux::I32(v) => u32::try_from(v).ok(),
        _ => None,
    }
}

fn convert_cigar(op: &Cigar) -> Option<CigarOp> {
    let (kind, len) = match *op {
        Cigar::Match(len) => (CigarOpKind::Match, len),
        Cigar::Ins(len) => (CigarOpKind::Insertion, len),
        Cigar::Del(len) => (CigarOpKind::Deletion, len),
        Cigar::RefSkip(len) => (CigarOpKind::Skip, len),
        Cigar::SoftClip(len) => (CigarOpKind::SoftClip, len),
        Cigar::HardClip(len) => (CigarOpKind::HardClip, len),
        Cigar::Equal(len) => (CigarOpKind::SequenceMatch, len),
        Cigar::Diff(len) => (CigarOpKind::SequenceMismatch, len),
        Cigar::Pad(_) => return None,
    };
    Some(CigarOp::new(kind, len))
}
