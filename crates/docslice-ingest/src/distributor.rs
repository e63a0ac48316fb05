//! Placement of orphan images across a document's chunks.

use docslice_core::DocumentChunk;

/// Assign images that could not be positioned to the document's chunks.
///
/// With `evenly`, the images are cut into one contiguous slice per chunk in
/// document order; slice sizes differ by at most one and the larger slices
/// come first. Otherwise every image goes to the first chunk. Images are
/// appended to what a chunk already carries.
pub fn distribute_images(chunks: &mut [DocumentChunk], orphans: &[String], evenly: bool) {
    if orphans.is_empty() || chunks.is_empty() {
        return;
    }

    if !evenly {
        chunks[0].attach_images(orphans);
        return;
    }

    let per_chunk = orphans.len() / chunks.len();
    let remainder = orphans.len() % chunks.len();
    let mut start = 0;

    for (i, chunk) in chunks.iter_mut().enumerate() {
        let take = per_chunk + usize::from(i < remainder);
        if take == 0 {
            break;
        }
        chunk.attach_images(&orphans[start..start + take]);
        start += take;
    }
}
