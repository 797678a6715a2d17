use windows::{
    core::Interface,
    Win32::{
        Foundation::HWND,
        Graphics::{
            Direct3D12::{
                ID3D12CommandQueue, ID3D12DescriptorHeap, ID3D12Device, ID3D12Resource,
                D3D12_CPU_DESCRIPTOR_HANDLE, D3D12_DESCRIPTOR_HEAP_DESC,
                D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
            },
            Dxgi::{
                Common::{DXGI_FORMAT_R8G8B8A8_UNORM, DXGI_SAMPLE_DESC},
                IDXGIFactory6, IDXGISwapChain3, DXGI_MWA_NO_ALT_ENTER, DXGI_PRESENT,
                DXGI_SWAP_CHAIN_DESC1, DXGI_SWAP_EFFECT_FLIP_DISCARD,
                DXGI_USAGE_RENDER_TARGET_OUTPUT,
            },
        },
    },
};

use crate::{error::Result, frame::BACK_BUFFER_COUNT};

/// Flip-model swap chain with one render-target view per back buffer. The
/// buffer count and the descriptor heap size are both `BACK_BUFFER_COUNT`;
/// there is no resize path.
pub struct SwapChain {
    swap_chain: IDXGISwapChain3,
    rtv_heap: ID3D12DescriptorHeap,
    rtv_descriptor_size: usize,
    back_buffers: Vec<ID3D12Resource>,
}

impl SwapChain {
    pub fn new(
        factory: &IDXGIFactory6,
        device: &ID3D12Device,
        command_queue: &ID3D12CommandQueue,
        hwnd: HWND,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let swap_chain_desc = DXGI_SWAP_CHAIN_DESC1 {
            BufferCount: BACK_BUFFER_COUNT,
            Width: width,
            Height: height,
            Format: DXGI_FORMAT_R8G8B8A8_UNORM,
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                ..Default::default()
            },
            ..Default::default()
        };

        let swap_chain: IDXGISwapChain3 = unsafe {
            factory.CreateSwapChainForHwnd(command_queue, hwnd, &swap_chain_desc, None, None)
        }?
        .cast()?;

        unsafe { factory.MakeWindowAssociation(hwnd, DXGI_MWA_NO_ALT_ENTER) }?;

        log::debug!(
            "swap chain {width}x{height}, first back buffer {}",
            unsafe { swap_chain.GetCurrentBackBufferIndex() }
        );

        let rtv_heap: ID3D12DescriptorHeap = unsafe {
            device.CreateDescriptorHeap(&D3D12_DESCRIPTOR_HEAP_DESC {
                NumDescriptors: BACK_BUFFER_COUNT,
                Type: D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
                ..Default::default()
            })
        }?;

        let rtv_descriptor_size =
            unsafe { device.GetDescriptorHandleIncrementSize(D3D12_DESCRIPTOR_HEAP_TYPE_RTV) }
                as usize;

        let rtv_start = unsafe { rtv_heap.GetCPUDescriptorHandleForHeapStart() };

        let mut back_buffers = Vec::with_capacity(BACK_BUFFER_COUNT as usize);
        for i in 0..BACK_BUFFER_COUNT {
            let back_buffer: ID3D12Resource = unsafe { swap_chain.GetBuffer(i) }?;
            unsafe {
                device.CreateRenderTargetView(
                    &back_buffer,
                    None,
                    D3D12_CPU_DESCRIPTOR_HANDLE {
                        ptr: rtv_start.ptr + i as usize * rtv_descriptor_size,
                    },
                )
            };
            back_buffers.push(back_buffer);
        }

        Ok(Self {
            swap_chain,
            rtv_heap,
            rtv_descriptor_size,
            back_buffers,
        })
    }

    pub fn current_back_buffer_index(&self) -> u32 {
        unsafe { self.swap_chain.GetCurrentBackBufferIndex() }
    }

    pub fn back_buffer(&self, index: u32) -> &ID3D12Resource {
        &self.back_buffers[index as usize]
    }

    pub fn rtv_handle(&self, index: u32) -> D3D12_CPU_DESCRIPTOR_HANDLE {
        debug_assert!(index < BACK_BUFFER_COUNT);

        D3D12_CPU_DESCRIPTOR_HANDLE {
            ptr: unsafe { self.rtv_heap.GetCPUDescriptorHandleForHeapStart() }.ptr
                + index as usize * self.rtv_descriptor_size,
        }
    }

    pub fn present(&self, sync_interval: u32) -> Result<()> {
        unsafe { self.swap_chain.Present(sync_interval, DXGI_PRESENT(0)) }.ok()?;
        Ok(())
    }
}
